//! Inclusion and exclusion rules derived from entry constraints.

use crate::axis::ConstraintSource;
use gantry_core::JobDescriptor;
use std::collections::BTreeSet;

/// A fully scalar rule; a job matches when it agrees on every key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExclusionRule(JobDescriptor);

impl ExclusionRule {
    pub fn new(fields: JobDescriptor) -> Self {
        Self(fields)
    }

    /// Expand a `blacklist` block of the entry `anchor_value` on `anchor_axis`.
    ///
    /// List-valued fields are expanded one field at a time rather than as a
    /// cross product: the base rule takes the first value of every field, and
    /// each further value yields one rule differing from the base in that
    /// field only. `{PYTHON: [2.7, 3.5], SUITE: [a, b]}` therefore excludes
    /// (2.7, a), (3.5, a) and (2.7, b), but not (3.5, b).
    ///
    /// A field with no values blacklists nothing, so the block yields no rules.
    pub fn expand(anchor_axis: &str, anchor_value: &str, blacklist: &ConstraintSource) -> Vec<Self> {
        if blacklist.iter().any(|(_, values)| values.is_empty()) {
            return Vec::new();
        }

        let mut base = JobDescriptor::new();
        base.insert(anchor_axis, anchor_value);
        for (axis, values) in blacklist {
            if let Some(first) = values.first() {
                base.insert(axis.as_str(), first.as_str());
            }
        }

        let mut rules = vec![Self(base.clone())];
        for (axis, values) in blacklist {
            for value in values.iter().skip(1) {
                let mut variant = base.clone();
                variant.insert(axis.as_str(), value.as_str());
                rules.push(Self(variant));
            }
        }
        rules
    }

    pub fn matches(&self, job: &JobDescriptor) -> bool {
        job.agrees_with(&self.0)
    }

    pub fn fields(&self) -> &JobDescriptor {
        &self.0
    }
}

/// Restricts the jobs whose anchor axis equals the anchor value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InclusionRule {
    pub anchor_axis: String,
    pub anchor_value: String,
    pub allowed: Vec<(String, BTreeSet<String>)>,
}

impl InclusionRule {
    pub fn new(anchor_axis: &str, anchor_value: &str, whitelist: &ConstraintSource) -> Self {
        Self {
            anchor_axis: anchor_axis.to_string(),
            anchor_value: anchor_value.to_string(),
            allowed: whitelist
                .iter()
                .map(|(axis, values)| (axis.clone(), values.iter().cloned().collect()))
                .collect(),
        }
    }

    /// Whether this rule lets `job` through.
    ///
    /// Jobs on other anchors are always admitted, as are jobs lacking an
    /// axis named in `allowed`.
    pub fn admits(&self, job: &JobDescriptor) -> bool {
        if job.get(&self.anchor_axis) != Some(self.anchor_value.as_str()) {
            return true;
        }
        self.allowed
            .iter()
            .all(|(axis, values)| job.get(axis).is_none_or(|value| values.contains(value)))
    }
}
