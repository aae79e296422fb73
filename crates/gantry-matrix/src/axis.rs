//! Axis model: normalizes raw matrix configuration into canonical form.
//!
//! A matrix document is an ordered YAML mapping of axis name to a list of
//! entries. Each entry is either a plain scalar or a mapping carrying an `id`
//! plus optional `blacklist`/`whitelist` constraint blocks; any other keys of
//! such a mapping are nested axes that expand in place of the entry.

use gantry_core::{Error, Result};
use serde_yaml::{Mapping, Value};
use std::collections::HashMap;

const ID_FIELD: &str = "id";
const BLACKLIST_FIELD: &str = "blacklist";
const WHITELIST_FIELD: &str = "whitelist";

/// Synonym table mapping configuration axis names to canonical keys.
///
/// Names without a synonym pass through unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxisVocabulary {
    synonyms: HashMap<String, String>,
}

impl AxisVocabulary {
    /// A vocabulary with no synonyms at all.
    pub fn empty() -> Self {
        Self {
            synonyms: HashMap::new(),
        }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            synonyms: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn with_synonym(mut self, name: impl Into<String>, canonical: impl Into<String>) -> Self {
        self.synonyms.insert(name.into(), canonical.into());
        self
    }

    /// Canonical key for an axis name.
    pub fn canonical<'a>(&'a self, name: &'a str) -> &'a str {
        self.synonyms.get(name).map(String::as_str).unwrap_or(name)
    }
}

impl Default for AxisVocabulary {
    fn default() -> Self {
        Self::from_pairs([("dists", "DIST"), ("python", "PYTHON"), ("suites", "SUITE")])
    }
}

/// Ordered mapping of canonical axis name to one or more values.
pub type ConstraintSource = Vec<(String, Vec<String>)>;

/// One value along an axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Scalar(String),
    Structured {
        id: String,
        blacklist: Option<ConstraintSource>,
        whitelist: Option<ConstraintSource>,
        /// Nested axes expanded in place of this entry.
        extra_axes: ConstraintSource,
    },
}

impl Entry {
    pub fn id(&self) -> &str {
        match self {
            Entry::Scalar(value) => value,
            Entry::Structured { id, .. } => id,
        }
    }
}

/// A named dimension of the matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Axis {
    pub name: String,
    pub entries: Vec<Entry>,
}

/// A parsed matrix document, axes in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatrixDefinition {
    pub axes: Vec<Axis>,
}

impl MatrixDefinition {
    /// Parse a YAML matrix document.
    pub fn from_yaml_str(input: &str, vocabulary: &AxisVocabulary) -> Result<Self> {
        let value: Value = serde_yaml::from_str(input)?;
        Self::from_value(&value, vocabulary)
    }

    pub fn from_value(value: &Value, vocabulary: &AxisVocabulary) -> Result<Self> {
        let document = match value {
            Value::Mapping(mapping) => mapping,
            Value::Null => return Ok(Self::default()),
            other => {
                return Err(Error::Config(format!(
                    "matrix document must be a mapping of axes, got {}",
                    describe(other)
                )));
            }
        };

        let mut axes = Vec::with_capacity(document.len());
        for (raw_name, raw_entries) in document {
            let raw_name = render_scalar(raw_name)?;
            let name = vocabulary.canonical(&raw_name).to_string();

            let Value::Sequence(raw_entries) = raw_entries else {
                return Err(Error::Config(format!(
                    "axis {} must be a list of entries, got {}",
                    raw_name,
                    describe(raw_entries)
                )));
            };

            let entries = raw_entries
                .iter()
                .map(|raw| parse_entry(&name, raw, vocabulary))
                .collect::<Result<Vec<_>>>()?;

            axes.push(Axis { name, entries });
        }

        Ok(Self { axes })
    }
}

fn parse_entry(axis: &str, raw: &Value, vocabulary: &AxisVocabulary) -> Result<Entry> {
    let Value::Mapping(fields) = raw else {
        return render_scalar(raw).map(Entry::Scalar);
    };

    let id = match fields.get(ID_FIELD) {
        Some(id) => render_scalar(id)?,
        None => {
            return Err(Error::MissingEntryId {
                axis: axis.to_string(),
                entry: serde_yaml::to_string(raw)
                    .map(|s| s.trim_end().to_string())
                    .unwrap_or_else(|_| format!("{:?}", raw)),
            });
        }
    };

    let mut blacklist = None;
    let mut whitelist = None;
    let mut extra_axes = ConstraintSource::new();

    for (key, value) in fields {
        let key = render_scalar(key)?;
        match key.as_str() {
            ID_FIELD => {}
            BLACKLIST_FIELD => blacklist = Some(parse_constraints(value, vocabulary)?),
            WHITELIST_FIELD => whitelist = Some(parse_constraints(value, vocabulary)?),
            _ => extra_axes.push((
                vocabulary.canonical(&key).to_string(),
                coerce_list(value)?,
            )),
        }
    }

    Ok(Entry::Structured {
        id,
        blacklist,
        whitelist,
        extra_axes,
    })
}

/// Parse a constraint block: axis name to a single value or a list of values.
pub fn parse_constraints(value: &Value, vocabulary: &AxisVocabulary) -> Result<ConstraintSource> {
    let mapping: &Mapping = match value {
        Value::Mapping(mapping) => mapping,
        Value::Null => return Ok(ConstraintSource::new()),
        other => {
            return Err(Error::Config(format!(
                "constraint block must be a mapping, got {}",
                describe(other)
            )));
        }
    };

    mapping
        .iter()
        .map(|(key, values)| {
            let key = render_scalar(key)?;
            Ok((vocabulary.canonical(&key).to_string(), coerce_list(values)?))
        })
        .collect()
}

/// Coerce a single scalar or a list of scalars into a list of strings.
fn coerce_list(value: &Value) -> Result<Vec<String>> {
    match value {
        Value::Sequence(items) => items.iter().map(render_scalar).collect(),
        other => Ok(vec![render_scalar(other)?]),
    }
}

/// Render a YAML scalar as the literal string used in job descriptors.
pub fn render_scalar(value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(Error::Config(format!(
            "expected a scalar value, got {}",
            describe(other)
        ))),
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
