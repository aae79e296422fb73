//! Gantry Core
//!
//! Core domain types and error handling for Gantry.
//! This crate has minimal dependencies and defines the shared vocabulary
//! used by the matrix expander, the image builder and the CLI.

pub mod error;
pub mod job;

pub use error::{Error, Result};
pub use job::{DIST_KEY, JobDescriptor};
