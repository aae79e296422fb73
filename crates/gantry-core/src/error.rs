//! Error types for Gantry.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Matrix errors
    #[error("Invalid matrix configuration: {0}")]
    Config(String),

    #[error("Missing field id in entry {entry} of axis {axis}")]
    MissingEntryId { axis: String, entry: String },

    // Build errors
    #[error("Won't build {requested} images (> {limit}). Either there was a problem with the test matrix or the limit should be increased.")]
    Capacity { requested: usize, limit: usize },

    #[error("Build task failed: {0}")]
    BuildTask(String),

    #[error("Command `{command}` exited with status {exit_code}")]
    CommandFailed { command: String, exit_code: i32 },

    // Version errors
    #[error("Cannot parse version: {0}")]
    VersionParse(String),

    // Infrastructure errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether this error originates from malformed configuration input.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Error::Config(_) | Error::MissingEntryId { .. } | Error::Serialization(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
