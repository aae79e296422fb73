//! A single image build: optional cache pull, build, optional push.

use crate::config::{BuildConfig, BuildOptions};
use crate::engine::{ContainerEngine, Invocation, OutputLine};
use crate::plan::BuildRequest;
use gantry_core::{Error, JobDescriptor, Result};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

const OUTPUT_BUFFER: usize = 256;

/// Outcome of the cache pull that precedes a build.
///
/// A failed pull is harmless: the build simply runs without `--cache-from`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullOutcome {
    Skipped,
    Pulled,
    Failed(String),
}

/// Lifecycle of a build task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Succeeded | TaskState::Failed)
    }
}

/// Everything a finished task hands back to the orchestrator.
#[derive(Debug)]
pub struct BuildTaskResult {
    pub tag: String,
    pub log: Vec<String>,
    pub pull: PullOutcome,
    pub error: Option<Error>,
}

impl BuildTaskResult {
    pub fn state(&self) -> TaskState {
        if self.error.is_some() {
            TaskState::Failed
        } else {
            TaskState::Succeeded
        }
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Append-only log owned by one task until it completes.
#[derive(Debug)]
struct LogSink {
    lines: Vec<String>,
    verbose: bool,
}

impl LogSink {
    fn new(verbose: bool) -> Self {
        Self {
            lines: Vec::new(),
            verbose,
        }
    }

    fn record(&mut self, line: impl Into<String>) {
        let line = line.into();
        if self.verbose {
            eprintln!("{}", line);
        }
        self.lines.push(line);
    }
}

/// A build bound to its Dockerfile, ready to run.
///
/// A task is [`TaskState::Pending`] until [`BuildTask::run`] consumes it;
/// the returned result carries the terminal state.
#[derive(Debug, Clone)]
pub struct BuildTask {
    request: BuildRequest,
    /// Dockerfile and context, or why they could not be determined.
    target: std::result::Result<(PathBuf, PathBuf), String>,
}

impl BuildTask {
    /// Bind a request to the first build profile that accepts it.
    pub fn new(request: BuildRequest, config: &BuildConfig, options: &BuildOptions) -> Self {
        let target = match config.profile_for(&request.identifier, &request.build_args) {
            Some(profile) => Ok(profile.resolve(&request.dist, &options.dockerfiles_dir)),
            None => Err(format!(
                "Error defining build arguments from {}",
                request.attributes
            )),
        };

        Self { request, target }
    }

    pub fn tag(&self) -> &str {
        &self.request.tag
    }

    pub fn attributes(&self) -> &JobDescriptor {
        &self.request.attributes
    }

    /// Run the task to completion. Failures are captured in the result,
    /// never returned.
    pub async fn run(self, engine: &dyn ContainerEngine, options: &BuildOptions) -> BuildTaskResult {
        debug!(tag = %self.request.tag, state = ?TaskState::Running, "Build task started");
        let mut sink = LogSink::new(options.verbose);
        let mut pull = PullOutcome::Skipped;

        let outcome = match &self.target {
            Ok((dockerfile, context)) => {
                self.execute(engine, options, dockerfile, context, &mut sink, &mut pull)
                    .await
            }
            Err(reason) => Err(Error::BuildTask(reason.clone())),
        };

        let error = match outcome {
            Ok(()) => {
                info!(tag = %self.request.tag, "Image build succeeded");
                None
            }
            Err(e) => {
                warn!(tag = %self.request.tag, error = %e, "Image build failed");
                Some(e)
            }
        };

        BuildTaskResult {
            tag: self.request.tag,
            log: sink.lines,
            pull,
            error,
        }
    }

    async fn execute(
        &self,
        engine: &dyn ContainerEngine,
        options: &BuildOptions,
        dockerfile: &Path,
        context: &Path,
        sink: &mut LogSink,
        pull: &mut PullOutcome,
    ) -> Result<()> {
        let tag = &self.request.tag;
        let program = options.engine_program.as_str();

        let mut cache_args: Vec<String> = Vec::new();
        if options.no_cache {
            cache_args.push("--no-cache".to_string());
            cache_args.push(options.pull_flag().to_string());
        } else if options.cache_repo.as_deref().is_some_and(|repo| !repo.is_empty()) {
            let invocation = Invocation::new(program).args(["pull", tag.as_str()]);
            *pull = match run_logged(engine, &invocation, sink).await {
                Ok(()) => PullOutcome::Pulled,
                Err(e) => {
                    warn!(tag = %tag, error = %e, "Cache pull failed, building without cache");
                    sink.record(format!("Cache pull failed: {}", e));
                    PullOutcome::Failed(e.to_string())
                }
            };
            if *pull == PullOutcome::Pulled {
                cache_args.push("--cache-from".to_string());
                cache_args.push(tag.clone());
            }
        }

        let build = Invocation::new(program)
            .arg("build")
            .args(cache_args)
            .args(["--file".to_string(), dockerfile.display().to_string()])
            .args(["--tag", tag.as_str()])
            .args(
                self.request
                    .build_args
                    .iter()
                    .flat_map(|(key, value)| ["--build-arg".to_string(), format!("{}={}", key, value)]),
            )
            .arg(context.display().to_string());
        run_logged(engine, &build, sink).await?;
        sink.record(format!("Finished building image {}", tag));

        if options.push_cache {
            let push = Invocation::new(program).args(["push", tag.as_str()]);
            run_logged(engine, &push, sink).await?;
        }

        Ok(())
    }
}

/// Run one command, draining its output into `sink` while it runs.
async fn run_logged(engine: &dyn ContainerEngine, invocation: &Invocation, sink: &mut LogSink) -> Result<()> {
    debug!(command = %invocation, "Running command");
    sink.record(format!("Running {}", invocation));

    let (tx, mut rx) = mpsc::channel::<OutputLine>(OUTPUT_BUFFER);
    let drain = async {
        while let Some(line) = rx.recv().await {
            trace!(stream = ?line.stream, line = %line.content, "Command output");
            sink.record(line.content);
        }
    };
    let (exit_code, ()) = tokio::join!(engine.run(invocation, tx), drain);

    match exit_code? {
        0 => Ok(()),
        exit_code => Err(Error::CommandFailed {
            command: invocation.to_string(),
            exit_code,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Engine that fails any subcommand listed in `failing` and records calls.
    struct FakeEngine {
        failing: Vec<&'static str>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeEngine {
        fn new(failing: Vec<&'static str>) -> Self {
            Self {
                failing,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ContainerEngine for FakeEngine {
        async fn run(&self, invocation: &Invocation, output_tx: mpsc::Sender<OutputLine>) -> Result<i32> {
            self.calls.lock().unwrap().push(invocation.to_string());
            let sub = invocation.subcommand().unwrap_or_default().to_string();
            let _ = output_tx
                .send(OutputLine::stderr(format!("{} output", sub)))
                .await;
            Ok(if self.failing.iter().any(|f| *f == sub) { 1 } else { 0 })
        }
    }

    fn request(identifier: &str, python: &str) -> BuildRequest {
        BuildRequest {
            tag: format!("repo/rucio-{}:alma9-python{}", identifier, python),
            dist: "alma9".to_string(),
            identifier: identifier.to_string(),
            build_args: vec![("PYTHON".to_string(), python.to_string())],
            attributes: [("DIST", "alma9"), ("PYTHON", python), ("IMAGE_IDENTIFIER", identifier)]
                .into_iter()
                .collect(),
        }
    }

    fn options() -> BuildOptions {
        BuildOptions {
            dockerfiles_dir: PathBuf::from("etc/docker/test"),
            cache_repo: Some("repo".to_string()),
            engine_program: "docker".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_pull_build_push_sequence() {
        let engine = FakeEngine::new(vec![]);
        let mut opts = options();
        opts.push_cache = true;
        let task = BuildTask::new(request("autotest", "3.9"), &BuildConfig::default(), &opts);

        let result = task.run(&engine, &opts).await;

        assert!(result.succeeded());
        assert_eq!(result.pull, PullOutcome::Pulled);
        assert_eq!(
            engine.calls(),
            vec![
                "docker pull repo/rucio-autotest:alma9-python3.9".to_string(),
                "docker build --cache-from repo/rucio-autotest:alma9-python3.9 --file etc/docker/test/alma9.Dockerfile --tag repo/rucio-autotest:alma9-python3.9 --build-arg PYTHON=3.9 .".to_string(),
                "docker push repo/rucio-autotest:alma9-python3.9".to_string(),
            ]
        );
        assert_eq!(result.log[0], "Running docker pull repo/rucio-autotest:alma9-python3.9");
        assert_eq!(result.log[1], "pull output");
        assert!(result.log.contains(&"Finished building image repo/rucio-autotest:alma9-python3.9".to_string()));
    }

    #[tokio::test]
    async fn test_failed_pull_is_swallowed() {
        let engine = FakeEngine::new(vec!["pull"]);
        let opts = options();
        let task = BuildTask::new(request("autotest", "3.9"), &BuildConfig::default(), &opts);

        let result = task.run(&engine, &opts).await;

        assert!(result.succeeded());
        assert!(matches!(result.pull, PullOutcome::Failed(_)));
        let calls = engine.calls();
        assert_eq!(calls.len(), 2);
        assert!(!calls[1].contains("--cache-from"));
    }

    #[tokio::test]
    async fn test_no_cache_skips_pull() {
        let engine = FakeEngine::new(vec![]);
        let mut opts = options();
        opts.no_cache = true;
        let task = BuildTask::new(request("autotest", "3.9"), &BuildConfig::default(), &opts);

        let result = task.run(&engine, &opts).await;

        assert_eq!(result.pull, PullOutcome::Skipped);
        let calls = engine.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].starts_with("docker build --no-cache --pull --file"));
    }

    #[tokio::test]
    async fn test_build_failure_captured() {
        let engine = FakeEngine::new(vec!["build"]);
        let mut opts = options();
        opts.push_cache = true;
        let task = BuildTask::new(request("autotest", "3.9"), &BuildConfig::default(), &opts);

        let result = task.run(&engine, &opts).await;

        assert_eq!(result.state(), TaskState::Failed);
        assert!(matches!(result.error, Some(Error::CommandFailed { exit_code: 1, .. })));
        // push never runs after a failed build
        assert_eq!(engine.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_profile_fails_without_running() {
        let engine = FakeEngine::new(vec![]);
        let opts = options();
        let task = BuildTask::new(request("integration-test", "3.9"), &BuildConfig::default(), &opts);

        let result = task.run(&engine, &opts).await;

        assert!(matches!(result.error, Some(Error::BuildTask(ref msg)) if msg.starts_with("Error defining build arguments")));
        assert!(engine.calls().is_empty());
    }
}
