//! Expected-message patterns and their canonical form.
//!
//! A pattern is an arbitrary JSON object supplied by the host. Two patterns
//! are the same expectation iff their canonical texts match, regardless of
//! the order their fields were written in.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::types::{Frequency, ValidationError};

/// Field of a declared pattern holding its frequency code.
pub const FREQUENCY_FIELD: &str = "frequency";

/// Errors for malformed pattern input.
#[derive(Debug, Error)]
pub enum InputError {
    /// The pattern list was not a JSON array.
    #[error("expected a JSON array of pattern objects, found {found}")]
    NotAList { found: &'static str },

    /// A pattern was not a JSON object.
    #[error("pattern {position} must be a JSON object, found {found}")]
    NotAnObject { position: usize, found: &'static str },

    /// The input was not valid JSON.
    #[error("invalid pattern JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Stable comparable key for a JSON value.
///
/// Object keys are sorted at every nesting level and no whitespace is
/// emitted, so equal values always produce byte-identical keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalKey(String);

impl CanonicalKey {
    /// Returns the canonical JSON text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<CanonicalKey> for String {
    fn from(key: CanonicalKey) -> Self {
        key.0
    }
}

/// Computes the canonical key of any JSON value.
pub fn canonical_key(value: &Value) -> CanonicalKey {
    let mut out = String::new();
    write_canonical(value, &mut out);
    CanonicalKey(out)
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(fields) => write_canonical_object(fields, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        leaf => out.push_str(&leaf.to_string()),
    }
}

fn write_canonical_object(fields: &Map<String, Value>, out: &mut String) {
    let mut entries: Vec<(&String, &Value)> = fields.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    out.push('{');
    for (i, (key, value)) in entries.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&Value::String(key.clone()).to_string());
        out.push(':');
        write_canonical(value, out);
    }
    out.push('}');
}

const fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// A structured description of a message a watcher is waiting for.
///
/// Equality and hashing go through [`CanonicalKey`].
#[derive(Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pattern(Map<String, Value>);

impl Pattern {
    /// Builds a pattern from a JSON value, which must be an object.
    pub fn from_value(value: Value) -> Result<Self, InputError> {
        match value {
            Value::Object(fields) => Ok(Self(fields)),
            other => Err(InputError::NotAnObject {
                position: 0,
                found: kind_of(&other),
            }),
        }
    }

    /// Parses a single pattern from JSON text.
    pub fn parse(text: &str) -> Result<Self, InputError> {
        Self::from_value(serde_json::from_str(text)?)
    }

    /// Builds a pattern list from a JSON value, which must be an array of objects.
    pub fn list_from_value(value: Value) -> Result<Vec<Self>, InputError> {
        let Value::Array(items) = value else {
            return Err(InputError::NotAList {
                found: kind_of(&value),
            });
        };
        items
            .into_iter()
            .enumerate()
            .map(|(position, item)| match item {
                Value::Object(fields) => Ok(Self(fields)),
                other => Err(InputError::NotAnObject {
                    position,
                    found: kind_of(&other),
                }),
            })
            .collect()
    }

    /// Parses a pattern list from JSON text.
    pub fn parse_list(text: &str) -> Result<Vec<Self>, InputError> {
        Self::list_from_value(serde_json::from_str(text)?)
    }

    /// Canonical key used for matching and storage.
    pub fn key(&self) -> CanonicalKey {
        let mut out = String::new();
        write_canonical_object(&self.0, &mut out);
        CanonicalKey(out)
    }

    /// Reads the declared frequency from the `frequency` field.
    pub fn frequency(&self) -> Result<Frequency, ValidationError> {
        match self.0.get(FREQUENCY_FIELD) {
            None => Err(ValidationError::MissingFrequency),
            Some(Value::String(code)) => code.parse(),
            Some(other) => Err(ValidationError::InvalidFrequency {
                value: other.to_string(),
            }),
        }
    }

    /// Looks up a single field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Pattern {}

impl Hash for Pattern {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pattern({})", self.key())
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}
