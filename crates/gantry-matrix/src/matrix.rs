//! Matrix expansion into flat job descriptors.

use crate::axis::{AxisVocabulary, ConstraintSource, Entry, MatrixDefinition};
use crate::rules::{ExclusionRule, InclusionRule};
use gantry_core::{JobDescriptor, Result};
use tracing::debug;

/// An entry reduced to what the cartesian product needs.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Slot {
    Id(String),
    Nested { id: String, axes: ConstraintSource },
}

/// Constraints collected while reducing entries.
#[derive(Debug, Default)]
struct Constraints {
    exclude: Vec<ExclusionRule>,
    include: Vec<InclusionRule>,
}

/// Expander for matrix configurations.
#[derive(Debug, Clone, Default)]
pub struct MatrixExpander {
    vocabulary: AxisVocabulary,
}

impl MatrixExpander {
    pub fn new(vocabulary: AxisVocabulary) -> Self {
        Self { vocabulary }
    }

    pub fn vocabulary(&self) -> &AxisVocabulary {
        &self.vocabulary
    }

    /// Parse a YAML matrix document and expand it.
    pub fn expand_yaml(&self, input: &str) -> Result<Vec<JobDescriptor>> {
        let definition = MatrixDefinition::from_yaml_str(input, &self.vocabulary)?;
        Ok(self.expand(&definition))
    }

    /// Expand a matrix definition into individual jobs.
    ///
    /// Jobs come out in product order (last axis varies fastest) and are
    /// never deduplicated.
    pub fn expand(&self, definition: &MatrixDefinition) -> Vec<JobDescriptor> {
        let mut constraints = Constraints::default();

        let dimensions: Vec<(String, Vec<Slot>)> = definition
            .axes
            .iter()
            .map(|axis| {
                let slots = axis
                    .entries
                    .iter()
                    .map(|entry| reduce_entry(&axis.name, entry, &mut constraints))
                    .collect();
                (axis.name.clone(), slots)
            })
            .collect();

        let mut jobs = Vec::new();
        for combo in cartesian(&dimensions) {
            self.resolve_nested(combo, &mut jobs);
        }
        let generated = jobs.len();

        // Apply includes
        jobs.retain(|job| constraints.include.iter().all(|rule| rule.admits(job)));

        // Apply excludes
        jobs.retain(|job| !constraints.exclude.iter().any(|rule| rule.matches(job)));

        debug!(
            axes = dimensions.len(),
            generated,
            kept = jobs.len(),
            inclusion_rules = constraints.include.len(),
            exclusion_rules = constraints.exclude.len(),
            "Expanded matrix"
        );

        jobs
    }

    /// Flatten one top-level combination, re-expanding nested entries.
    fn resolve_nested(&self, combo: Vec<(String, Slot)>, jobs: &mut Vec<JobDescriptor>) {
        // Later axes overwrite earlier ones on key collision.
        let mut merged: Vec<(String, Slot)> = Vec::with_capacity(combo.len());
        for (axis, slot) in combo {
            match merged.iter_mut().find(|(existing, _)| *existing == axis) {
                Some(entry) => entry.1 = slot,
                None => merged.push((axis, slot)),
            }
        }

        let mut statics = JobDescriptor::new();
        let mut nested_axes = ConstraintSource::new();
        for (axis, slot) in merged {
            match slot {
                Slot::Id(id) => statics.insert(axis, id),
                Slot::Nested { id, axes } => {
                    statics.insert(axis, id);
                    nested_axes.extend(axes);
                }
            }
        }

        if nested_axes.is_empty() {
            jobs.push(statics);
            return;
        }

        for values in cartesian(&nested_axes) {
            let mut job = statics.clone();
            for (axis, value) in values {
                job.insert(axis, value);
            }
            jobs.push(job);
        }
    }
}

/// Reduce an entry to a slot, recording its constraints.
fn reduce_entry(axis: &str, entry: &Entry, constraints: &mut Constraints) -> Slot {
    match entry {
        Entry::Scalar(value) => Slot::Id(value.clone()),
        Entry::Structured {
            id,
            blacklist,
            whitelist,
            extra_axes,
        } => {
            if let Some(blacklist) = blacklist {
                constraints
                    .exclude
                    .extend(ExclusionRule::expand(axis, id, blacklist));
            }
            if let Some(whitelist) = whitelist {
                constraints
                    .include
                    .push(InclusionRule::new(axis, id, whitelist));
            }

            if extra_axes.is_empty() {
                Slot::Id(id.clone())
            } else {
                Slot::Nested {
                    id: id.clone(),
                    axes: extra_axes.clone(),
                }
            }
        }
    }
}

/// Cartesian product of named dimensions, last dimension varying fastest.
fn cartesian<T: Clone>(dimensions: &[(String, Vec<T>)]) -> Vec<Vec<(String, T)>> {
    let mut result = vec![Vec::new()];

    for (key, values) in dimensions {
        let mut new_result = Vec::with_capacity(result.len() * values.len());

        for combo in &result {
            for value in values {
                let mut new_combo = combo.clone();
                new_combo.push((key.clone(), value.clone()));
                new_result.push(new_combo);
            }
        }

        result = new_result;
    }

    result
}
