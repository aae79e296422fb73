//! Job descriptors: one fully resolved combination of matrix axis values.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Axis key that names the OS distribution of a job.
pub const DIST_KEY: &str = "DIST";

/// A flat mapping of axis name to literal value.
///
/// The keys are exactly the axes that contributed to the combination, kept
/// in the order they were first set. Equality ignores key order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobDescriptor(IndexMap<String, String>);

impl JobDescriptor {
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    pub fn get(&self, axis: &str) -> Option<&str> {
        self.0.get(axis).map(String::as_str)
    }

    pub fn contains_axis(&self, axis: &str) -> bool {
        self.0.contains_key(axis)
    }

    /// Set an axis value. Overwriting keeps the axis in its original position.
    pub fn insert(&mut self, axis: impl Into<String>, value: impl Into<String>) {
        self.0.insert(axis.into(), value.into());
    }

    pub fn remove(&mut self, axis: &str) -> Option<String> {
        self.0.shift_remove(axis)
    }

    /// Merge another descriptor into this one; keys from `other` win.
    pub fn merge(&mut self, other: &JobDescriptor) {
        for (axis, value) in &other.0 {
            self.0.insert(axis.clone(), value.clone());
        }
    }

    /// True when every key of `subset` is present here with the same value.
    pub fn agrees_with(&self, subset: &JobDescriptor) -> bool {
        subset
            .0
            .iter()
            .all(|(axis, value)| self.0.get(axis) == Some(value))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for JobDescriptor {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl fmt::Display for JobDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}
