//! Command handlers.

use crate::commands::BuildArgs;
use crate::config::CliConfig;
use crate::version;
use anyhow::{Context, Result, bail};
use console::style;
use gantry_builder::plan::job_from_value;
use gantry_builder::{
    BuildOptions, BuildPlan, BuildTask, ContainerEngine, Orchestrator, OutputShape, pair_cases,
    parse_jobs,
};
use gantry_core::{Error, JobDescriptor};
use gantry_matrix::MatrixExpander;
use serde_json::Value;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

/// Exit status on success.
pub const EXIT_SUCCESS: u8 = 0;
/// Exit status when a version string cannot be parsed or is not satisfied.
pub const EXIT_VERSION: u8 = 1;
/// Exit status when more images are requested than the safety ceiling.
pub const EXIT_CAPACITY: u8 = 2;

/// Read a file, or all of stdin when no path is given.
pub fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display())),
        None => std::io::read_to_string(std::io::stdin()).context("Could not read stdin"),
    }
}

/// Expand a YAML matrix document and print the jobs as JSON.
pub fn matrix<W: Write>(config: &CliConfig, input: &str, out: &mut W) -> Result<u8> {
    let expander = MatrixExpander::new(config.vocabulary());
    let jobs = expander
        .expand_yaml(input)
        .context("Could not expand the test matrix")?;

    info!(jobs = jobs.len(), "Expanded test matrix");
    serde_json::to_writer(&mut *out, &jobs)?;
    writeln!(out)?;
    Ok(EXIT_SUCCESS)
}

/// Build every image the job list needs.
///
/// The JSON summary goes to `out`; build logs go to `report`.
pub async fn build<W: Write, R: Write>(
    args: &BuildArgs,
    config: &CliConfig,
    engine: &dyn ContainerEngine,
    input: &str,
    out: &mut W,
    report: &mut R,
) -> Result<u8> {
    if args.tool_version {
        writeln!(
            out,
            "gantry build tool, version {}",
            version::tool_version_string()
        )?;
        return Ok(EXIT_SUCCESS);
    }

    if let Some(required) = &args.version_test {
        return Ok(match version::satisfies(required) {
            Ok(true) => EXIT_SUCCESS,
            Ok(false) => EXIT_VERSION,
            Err(e) => {
                writeln!(report, "{}", e)?;
                EXIT_VERSION
            }
        });
    }

    let build_config = &config.build;
    let jobs = parse_jobs(input).context("Could not parse the job list")?;
    let branch = args
        .branch
        .clone()
        .or_else(|| build_config.default_branch.clone());
    let cache_repo = args
        .cache_repo
        .clone()
        .or_else(|| build_config.default_cache_repo.clone())
        .filter(|repo| !repo.is_empty());

    let plan = BuildPlan::from_jobs(&jobs, build_config, branch.as_deref(), cache_repo.as_deref())
        .context("Could not plan image builds")?;
    debug!(images = plan.len(), "Build plan ready");

    let options = BuildOptions {
        dockerfiles_dir: args.dockerfiles_dir.clone(),
        no_cache: args.build_no_cache,
        cache_repo,
        push_cache: args.push_cache,
        branch,
        verbose: args.verbose,
        use_podman: BuildOptions::podman_from_env(),
        engine_program: build_config.engine_program.clone(),
    };

    let tasks: Vec<BuildTask> = plan
        .requests
        .into_iter()
        .map(|request| BuildTask::new(request, build_config, &options))
        .collect();

    let orchestrator = Orchestrator::new(engine, options, build_config.max_images);
    let build_report = match orchestrator.run(tasks, report).await {
        Ok(build_report) => build_report,
        Err(e @ Error::Capacity { .. }) => {
            writeln!(report, "{} {}", style("✗").red().for_stderr(), e)?;
            return Ok(EXIT_CAPACITY);
        }
        Err(e) => return Err(e.into()),
    };

    let shape = OutputShape::from(args.output);
    serde_json::to_writer(&mut *out, &build_report.summary(shape)?)?;
    writeln!(out)?;
    Ok(EXIT_SUCCESS)
}

/// Pair test cases with built images and print the pairs as JSON.
///
/// Input is `{"matrix": <job or list of jobs>, "images": {tag: attributes}}`.
pub fn pair<W: Write>(input: &str, out: &mut W) -> Result<u8> {
    let document: Value = serde_json::from_str(input).context("Could not parse pairing input")?;

    let cases: Vec<JobDescriptor> = match document.get("matrix") {
        Some(Value::Array(items)) => items.iter().map(job_from_value).collect::<Result<_, _>>()?,
        Some(single @ Value::Object(_)) => vec![job_from_value(single)?],
        _ => bail!("pairing input needs a `matrix` object or list"),
    };

    let Some(Value::Object(raw_images)) = document.get("images") else {
        bail!("pairing input needs an `images` object");
    };
    let images: Vec<(String, JobDescriptor)> = raw_images
        .iter()
        .map(|(tag, attributes)| Ok((tag.clone(), job_from_value(attributes)?)))
        .collect::<Result<_, Error>>()?;

    let pairs = pair_cases(&cases, &images);
    info!(cases = cases.len(), pairs = pairs.len(), "Paired test cases with images");
    serde_json::to_writer(&mut *out, &pairs)?;
    writeln!(out)?;
    Ok(EXIT_SUCCESS)
}
