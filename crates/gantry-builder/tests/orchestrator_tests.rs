//! Orchestrator behavior against a scripted container engine.

use async_trait::async_trait;
use gantry_builder::{
    BuildConfig, BuildOptions, BuildPlan, BuildTask, ContainerEngine, Invocation, Orchestrator,
    OutputLine, OutputShape, TaskState,
};
use gantry_core::{Error, JobDescriptor, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Per-image script: build delay and build exit code, keyed by python version.
struct ScriptedEngine {
    builds: HashMap<&'static str, (u64, i32)>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedEngine {
    fn new(builds: &[(&'static str, u64, i32)]) -> Self {
        Self {
            builds: builds.iter().map(|(k, d, c)| (*k, (*d, *c))).collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContainerEngine for ScriptedEngine {
    async fn run(&self, invocation: &Invocation, output_tx: mpsc::Sender<OutputLine>) -> Result<i32> {
        self.calls.lock().unwrap().push(invocation.to_string());

        let (delay_ms, exit_code) = self
            .builds
            .iter()
            .find(|(python, _)| invocation.args.iter().any(|a| a == &format!("PYTHON={}", python)))
            .map(|(_, script)| *script)
            .unwrap_or((0, 0));

        for step in 1..=3u32 {
            let _ = output_tx
                .send(OutputLine::stdout(format!("step {}", step)))
                .await;
            tokio::time::sleep(Duration::from_millis(delay_ms / 3)).await;
        }
        Ok(exit_code)
    }
}

fn job(python: &str) -> JobDescriptor {
    [("DIST", "alma9"), ("PYTHON", python), ("IMAGE_IDENTIFIER", "autotest")]
        .into_iter()
        .collect()
}

fn options() -> BuildOptions {
    BuildOptions {
        dockerfiles_dir: PathBuf::from("etc/docker/test"),
        engine_program: "docker".to_string(),
        ..Default::default()
    }
}

fn tasks(pythons: &[&str], options: &BuildOptions) -> Vec<BuildTask> {
    let config = BuildConfig::default();
    let jobs: Vec<JobDescriptor> = pythons.iter().map(|p| job(p)).collect();
    BuildPlan::from_jobs(&jobs, &config, None, None)
        .unwrap()
        .requests
        .into_iter()
        .map(|request| BuildTask::new(request, &config, options))
        .collect()
}

#[tokio::test]
async fn test_failure_is_isolated_to_its_task() {
    let engine = ScriptedEngine::new(&[("3.7", 0, 0), ("3.8", 0, 2), ("3.9", 0, 0)]);
    let opts = options();
    let orchestrator = Orchestrator::new(&engine, opts.clone(), 20);
    let mut out = Vec::new();

    let report = orchestrator
        .run(tasks(&["3.7", "3.8", "3.9"], &opts), &mut out)
        .await
        .unwrap();

    assert_eq!(report.results.len(), 3);
    assert_eq!(report.images.len(), 3);
    assert_eq!(report.failed().count(), 1);
    assert_eq!(report.succeeded().count(), 2);

    let failed = report.result_for("rucio-autotest:alma9-python3.8").unwrap();
    assert_eq!(failed.state(), TaskState::Failed);
    assert!(matches!(failed.error, Some(Error::CommandFailed { exit_code: 2, .. })));

    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("building 'rucio-autotest:alma9-python3.7' complete"));
    assert!(text.contains("building 'rucio-autotest:alma9-python3.8' errored with"));
    assert!(text.contains("building 'rucio-autotest:alma9-python3.9' complete"));
}

#[tokio::test]
async fn test_results_join_in_completion_order() {
    let engine = ScriptedEngine::new(&[("3.7", 600, 0), ("3.8", 300, 0), ("3.9", 0, 0)]);
    let opts = options();
    let orchestrator = Orchestrator::new(&engine, opts.clone(), 20);
    let mut out = Vec::new();

    let start = Instant::now();
    let report = orchestrator
        .run(tasks(&["3.7", "3.8", "3.9"], &opts), &mut out)
        .await
        .unwrap();
    let elapsed = start.elapsed();

    let completed: Vec<&str> = report.results.iter().map(|r| r.tag.as_str()).collect();
    assert_eq!(
        completed,
        vec![
            "rucio-autotest:alma9-python3.9",
            "rucio-autotest:alma9-python3.8",
            "rucio-autotest:alma9-python3.7",
        ]
    );
    // submission order is kept for the summary
    assert_eq!(report.images[0].0, "rucio-autotest:alma9-python3.7");

    // builds overlap instead of running back to back
    assert!(elapsed < Duration::from_millis(850), "took {:?}", elapsed);
}

#[tokio::test]
async fn test_logs_are_printed_as_whole_blocks() {
    let engine = ScriptedEngine::new(&[("3.7", 90, 0), ("3.8", 30, 0)]);
    let opts = options();
    let orchestrator = Orchestrator::new(&engine, opts.clone(), 20);
    let mut out = Vec::new();

    orchestrator
        .run(tasks(&["3.7", "3.8"], &opts), &mut out)
        .await
        .unwrap();

    let text = String::from_utf8(out).unwrap();
    let first = text.find("build 'rucio-autotest:alma9-python3.8' output:").unwrap();
    let first_done = text.find("building 'rucio-autotest:alma9-python3.8' complete").unwrap();
    let second = text.find("build 'rucio-autotest:alma9-python3.7' output:").unwrap();

    assert!(first < first_done && first_done < second);
    let block = &text[first..first_done];
    assert_eq!(block.matches("step ").count(), 3);
    assert!(block.contains("Finished building image rucio-autotest:alma9-python3.8"));
}

#[tokio::test]
async fn test_capacity_ceiling_starts_nothing() {
    let engine = ScriptedEngine::new(&[]);
    let opts = options();
    let orchestrator = Orchestrator::new(&engine, opts.clone(), 2);
    let mut out = Vec::new();

    let err = orchestrator
        .run(tasks(&["3.7", "3.8", "3.9"], &opts), &mut out)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Capacity { requested: 3, limit: 2 }));
    assert!(engine.calls().is_empty());
    assert!(out.is_empty());
}

#[tokio::test]
async fn test_summary_shapes() {
    let engine = ScriptedEngine::new(&[("3.8", 0, 1)]);
    let opts = options();
    let orchestrator = Orchestrator::new(&engine, opts.clone(), 20);
    let mut out = Vec::new();

    let report = orchestrator
        .run(tasks(&["3.7", "3.8"], &opts), &mut out)
        .await
        .unwrap();

    assert_eq!(
        report.summary(OutputShape::List).unwrap(),
        serde_json::json!(["rucio-autotest:alma9-python3.7", "rucio-autotest:alma9-python3.8"])
    );
    assert_eq!(
        report.summary(OutputShape::Dict).unwrap(),
        serde_json::json!({
            "rucio-autotest:alma9-python3.7": {"DIST": "alma9", "IMAGE_IDENTIFIER": "autotest", "PYTHON": "3.7"},
            "rucio-autotest:alma9-python3.8": {"DIST": "alma9", "IMAGE_IDENTIFIER": "autotest", "PYTHON": "3.8"},
        })
    );
}
