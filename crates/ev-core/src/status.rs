//! Aggregate status and queries over a watcher's records.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::pattern::{CanonicalKey, Pattern, canonical_key};
use crate::record::ExpectationRecord;

/// Whether every expectation of a watcher is currently satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WatcherStatus {
    AllReceived,
    NotAllReceived,
}

impl WatcherStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AllReceived => "ALL_RECEIVED",
            Self::NotAllReceived => "NOT_ALL_RECEIVED",
        }
    }
}

impl fmt::Display for WatcherStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// `AllReceived` iff every record is satisfied; vacuously true for no records.
pub fn derive_status(records: &[ExpectationRecord]) -> WatcherStatus {
    if records.iter().all(ExpectationRecord::is_satisfied) {
        WatcherStatus::AllReceived
    } else {
        WatcherStatus::NotAllReceived
    }
}

/// Patterns of all records still awaiting a message.
pub fn unreceived(records: &[ExpectationRecord]) -> Vec<Pattern> {
    records
        .iter()
        .filter(|record| record.is_awaiting())
        .map(|record| record.pattern.clone())
        .collect()
}

/// Patterns satisfied earlier in a still-valid window but absent from `observed`.
///
/// Used after a scan that only covered recent messages, so patterns matched
/// before the scan window are not waited on again.
pub fn carried_over_successes(
    records: &[ExpectationRecord],
    observed: &[Value],
    now: DateTime<Utc>,
) -> Vec<Pattern> {
    let observed: HashSet<CanonicalKey> = observed.iter().map(canonical_key).collect();
    records
        .iter()
        .filter(|record| record.is_success_valid_at(now))
        .filter(|record| !observed.contains(&record.key()))
        .map(|record| record.pattern.clone())
        .collect()
}
