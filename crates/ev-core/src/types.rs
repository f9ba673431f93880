//! Core type definitions with validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// Invalid frequency value.
    #[error("frequency should be one of [\"D\", \"M\"], got {value}")]
    InvalidFrequency { value: String },

    /// The pattern does not declare a frequency.
    #[error("pattern has no frequency field")]
    MissingFrequency,

    /// Invalid source type value.
    #[error("source type should be one of [\"base\", \"kafka\"], got {value}")]
    InvalidSourceType { value: String },
}

/// How often an expected message should arrive.
///
/// Each variant maps to one calendar window; once the window closes the
/// expectation rolls over to awaiting again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Frequency {
    /// Expected once per calendar day.
    Daily,
    /// Expected once per calendar month.
    Monthly,
}

impl Frequency {
    /// String representation for database storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "D",
            Self::Monthly => "M",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Frequency {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "D" => Ok(Self::Daily),
            "M" => Ok(Self::Monthly),
            _ => Err(ValidationError::InvalidFrequency {
                value: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for Frequency {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Frequency> for String {
    fn from(frequency: Frequency) -> Self {
        frequency.as_str().to_string()
    }
}

/// Where expected messages are consumed from.
///
/// Selects which deadline policy applies to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SourceType {
    /// In-process source used by tests and local hosts.
    Base,
    /// Kafka topic consumer.
    Kafka,
}

impl SourceType {
    /// All known source types.
    pub const ALL: [Self; 2] = [Self::Base, Self::Kafka];

    /// String representation for database storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::Kafka => "kafka",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SourceType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "base" => Ok(Self::Base),
            "kafka" => Ok(Self::Kafka),
            _ => Err(ValidationError::InvalidSourceType {
                value: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for SourceType {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SourceType> for String {
    fn from(source: SourceType) -> Self {
        source.as_str().to_string()
    }
}

/// A validated watcher (sensor) name.
///
/// Every record is scoped by this name. Names must be non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WatcherName(String);

impl WatcherName {
    /// Creates a new name after validation.
    pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ValidationError::Empty {
                field: "watcher name",
            });
        }
        Ok(Self(name))
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for WatcherName {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<WatcherName> for String {
    fn from(name: WatcherName) -> Self {
        name.0
    }
}

impl fmt::Display for WatcherName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for WatcherName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
