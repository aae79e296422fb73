//! Turns job descriptors into a deduplicated set of image builds.

use crate::config::BuildConfig;
use crate::tag::TagNamer;
use gantry_core::{Error, JobDescriptor, Result};
use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;

/// One image to build, with the job attributes it originates from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub tag: String,
    pub dist: String,
    pub identifier: String,
    /// Build arguments passed to the builder; excludes the identifier.
    pub build_args: Vec<(String, String)>,
    /// Distribution plus every build-arg key, identifier included.
    pub attributes: JobDescriptor,
}

/// The ordered, deduplicated builds for a job list.
#[derive(Debug, Clone, Default)]
pub struct BuildPlan {
    pub requests: Vec<BuildRequest>,
}

impl BuildPlan {
    /// Derive the builds needed by `jobs`, first occurrence wins.
    pub fn from_jobs(
        jobs: &[JobDescriptor],
        config: &BuildConfig,
        branch: Option<&str>,
        cache_repo: Option<&str>,
    ) -> Result<Self> {
        let namer = TagNamer::new(config.project.as_str());
        let mut seen = HashSet::new();
        let mut requests = Vec::new();

        for job in jobs {
            let dist = job.get(&config.distribution_key).ok_or_else(|| {
                Error::Config(format!(
                    "job {} lacks the distribution key {}",
                    job, config.distribution_key
                ))
            })?;

            let mut attributes = JobDescriptor::new();
            attributes.insert(config.distribution_key.as_str(), dist);

            let mut identifier = None;
            let mut build_args = Vec::new();
            for key in &config.build_arg_keys {
                let Some(value) = job.get(key) else {
                    continue;
                };
                attributes.insert(key.as_str(), value);
                if *key == config.identifier_key {
                    identifier = Some(value);
                } else {
                    build_args.push((key.clone(), value.to_string()));
                }
            }

            let identifier = identifier.ok_or_else(|| {
                Error::Config(format!(
                    "job {} lacks the image identifier key {}",
                    job, config.identifier_key
                ))
            })?;

            let tag = namer.tag(dist, &build_args, identifier, branch, cache_repo);
            if !seen.insert(tag.clone()) {
                continue;
            }

            requests.push(BuildRequest {
                tag,
                dist: dist.to_string(),
                identifier: identifier.to_string(),
                build_args,
                attributes,
            });
        }

        debug!(jobs = jobs.len(), images = requests.len(), "Planned image builds");
        Ok(Self { requests })
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

/// Parse a JSON job document: a single object or a list of objects.
pub fn parse_jobs(input: &str) -> Result<Vec<JobDescriptor>> {
    let value: Value = serde_json::from_str(input)?;
    match value {
        Value::Array(items) => items.iter().map(job_from_value).collect(),
        single @ Value::Object(_) => Ok(vec![job_from_value(&single)?]),
        other => Err(Error::Config(format!(
            "expected a job object or a list of jobs, got {}",
            other
        ))),
    }
}

/// Convert a JSON object into a job descriptor, rendering scalars as strings.
pub fn job_from_value(value: &Value) -> Result<JobDescriptor> {
    let Value::Object(fields) = value else {
        return Err(Error::Config(format!("expected a job object, got {}", value)));
    };

    fields
        .iter()
        .map(|(key, value)| {
            let rendered = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                other => {
                    return Err(Error::Config(format!(
                        "job field {} must be a scalar, got {}",
                        key, other
                    )));
                }
            };
            Ok((key.clone(), rendered))
        })
        .collect()
}
