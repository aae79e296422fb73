//! Test matrix expansion for Gantry.
//!
//! Turns a declarative description of CI axes into a flat list of
//! [`JobDescriptor`](gantry_core::JobDescriptor)s, honoring per-entry
//! blacklist/whitelist constraints and nested sub-axes.

pub mod axis;
pub mod matrix;
pub mod rules;

pub use axis::{Axis, AxisVocabulary, Entry, MatrixDefinition};
pub use matrix::MatrixExpander;
pub use rules::{ExclusionRule, InclusionRule};
