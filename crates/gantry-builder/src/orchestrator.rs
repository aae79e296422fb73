//! Concurrent build orchestration.
//!
//! All tasks start at once and are joined in completion order. Each task's
//! log is written to the report stream as one block only after the task has
//! finished, so output from different builds never interleaves.

use crate::config::BuildOptions;
use crate::engine::ContainerEngine;
use crate::task::{BuildTask, BuildTaskResult};
use console::style;
use futures::stream::{FuturesUnordered, StreamExt};
use gantry_core::{Error, JobDescriptor, Result};
use serde_json::Value;
use std::io::Write;
use tracing::{info, warn};

/// Shape of the final JSON summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputShape {
    /// Bare list of tags.
    List,
    /// Tag to originating job attributes.
    #[default]
    Dict,
}

/// Outcome of one orchestrator run.
#[derive(Debug)]
pub struct BuildReport {
    /// Every planned image, in submission order, regardless of outcome.
    pub images: Vec<(String, JobDescriptor)>,
    /// Task results in completion order.
    pub results: Vec<BuildTaskResult>,
}

impl BuildReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &BuildTaskResult> {
        self.results.iter().filter(|r| r.succeeded())
    }

    pub fn failed(&self) -> impl Iterator<Item = &BuildTaskResult> {
        self.results.iter().filter(|r| !r.succeeded())
    }

    pub fn result_for(&self, tag: &str) -> Option<&BuildTaskResult> {
        self.results.iter().find(|r| r.tag == tag)
    }

    pub fn summary(&self, shape: OutputShape) -> Result<Value> {
        match shape {
            OutputShape::List => Ok(Value::Array(
                self.images
                    .iter()
                    .map(|(tag, _)| Value::String(tag.clone()))
                    .collect(),
            )),
            OutputShape::Dict => {
                let mut map = serde_json::Map::new();
                for (tag, attributes) in &self.images {
                    map.insert(tag.clone(), serde_json::to_value(attributes)?);
                }
                Ok(Value::Object(map))
            }
        }
    }
}

/// Runs build tasks concurrently behind a fixed safety ceiling.
pub struct Orchestrator<'a> {
    engine: &'a dyn ContainerEngine,
    options: BuildOptions,
    max_tasks: usize,
}

impl<'a> Orchestrator<'a> {
    pub fn new(engine: &'a dyn ContainerEngine, options: BuildOptions, max_tasks: usize) -> Self {
        Self {
            engine,
            options,
            max_tasks,
        }
    }

    /// Run every task and write each finished task's log to `report`.
    ///
    /// Fails with [`Error::Capacity`] without starting anything when there
    /// are more tasks than the ceiling allows. Individual build failures are
    /// part of the returned report, not errors.
    pub async fn run<W: Write>(&self, tasks: Vec<BuildTask>, report: &mut W) -> Result<BuildReport> {
        if tasks.len() > self.max_tasks {
            return Err(Error::Capacity {
                requested: tasks.len(),
                limit: self.max_tasks,
            });
        }

        let images: Vec<(String, JobDescriptor)> = tasks
            .iter()
            .map(|task| (task.tag().to_string(), task.attributes().clone()))
            .collect();

        info!(tasks = tasks.len(), "Starting image builds");
        let mut pending = FuturesUnordered::new();
        for task in tasks {
            if self.options.verbose {
                eprintln!("starting build for tag '{}'", task.tag());
            }
            pending.push(task.run(self.engine, &self.options));
        }

        let mut results = Vec::with_capacity(images.len());
        while let Some(result) = pending.next().await {
            write_block(report, &result)?;
            results.push(result);
        }

        let failed = results.iter().filter(|r| !r.succeeded()).count();
        if failed > 0 {
            warn!(failed, total = results.len(), "Some image builds failed");
        } else {
            info!(total = results.len(), "All image builds succeeded");
        }

        Ok(BuildReport { images, results })
    }
}

fn write_block<W: Write>(report: &mut W, result: &BuildTaskResult) -> Result<()> {
    writeln!(report)?;
    writeln!(report, "build '{}' output:", result.tag)?;
    for line in &result.log {
        writeln!(report, "{}", line)?;
    }
    match &result.error {
        None => writeln!(
            report,
            "{} building '{}' complete",
            style("✓").green().for_stderr(),
            result.tag
        )?,
        Some(error) => writeln!(
            report,
            "{} building '{}' errored with {}",
            style("✗").red().for_stderr(),
            result.tag,
            error
        )?,
    }
    report.flush()?;
    Ok(())
}
