//! Concurrent container image builds for Gantry.
//!
//! A [`BuildPlan`] turns job descriptors into deduplicated image builds,
//! each [`BuildTask`] pulls, builds and pushes one image, and the
//! [`Orchestrator`] runs them all at once, joining in completion order.

pub mod config;
pub mod engine;
pub mod orchestrator;
pub mod pairing;
pub mod plan;
pub mod tag;
pub mod task;

pub use config::{BuildConfig, BuildContext, BuildOptions, BuildProfile};
pub use engine::{ContainerEngine, DockerEngine, Invocation, OutputLine, OutputStream};
pub use orchestrator::{BuildReport, Orchestrator, OutputShape};
pub use pairing::{TestPairing, pair_cases};
pub use plan::{BuildPlan, BuildRequest, parse_jobs};
pub use tag::TagNamer;
pub use task::{BuildTask, BuildTaskResult, PullOutcome, TaskState};
