//! Expectation records: one per (watcher, pattern).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::pattern::{CanonicalKey, Pattern};
use crate::types::{Frequency, SourceType, ValidationError, WatcherName};

/// The payload that last satisfied a pattern and when it arrived.
///
/// Received fields are either both present or both absent, so a record
/// holds `Option<Receipt>` rather than two independent options. Any JSON
/// value counts as a present payload, including `0`, `false` and `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub payload: Value,
    pub received_at: DateTime<Utc>,
}

/// A stored expectation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectationRecord {
    /// Identity assigned by the store.
    pub id: i64,
    pub watcher: WatcherName,
    pub pattern: Pattern,
    pub source_type: SourceType,
    pub frequency: Frequency,
    /// Present when the record is satisfied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt: Option<Receipt>,
    /// End of the current expectation window.
    pub deadline: DateTime<Utc>,
}

impl ExpectationRecord {
    /// True when no message has satisfied the pattern in the current window.
    pub const fn is_awaiting(&self) -> bool {
        self.receipt.is_none()
    }

    /// True when both received fields are set.
    pub const fn is_satisfied(&self) -> bool {
        self.receipt.is_some()
    }

    /// True once `now` has passed the deadline.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.deadline < now
    }

    /// True when the record was satisfied before its deadline and the window
    /// is still open at `now`.
    ///
    /// A window is closed from the deadline instant onwards, even if the
    /// record has not been reset yet.
    pub fn is_success_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.deadline
            && self
                .receipt
                .as_ref()
                .is_some_and(|receipt| receipt.received_at < self.deadline)
    }

    /// Canonical key of the pattern.
    pub fn key(&self) -> CanonicalKey {
        self.pattern.key()
    }
}

/// A validated record that has not been stored yet.
///
/// Construction checks the frequency before anything reaches storage.
#[derive(Debug, Clone, PartialEq)]
pub struct NewExpectation {
    pub watcher: WatcherName,
    pub pattern: Pattern,
    pub source_type: SourceType,
    pub frequency: Frequency,
}

impl NewExpectation {
    /// Builds an expectation for a declared pattern, reading its frequency
    /// from the pattern body.
    pub fn declared(
        watcher: WatcherName,
        pattern: Pattern,
        source_type: SourceType,
    ) -> Result<Self, ValidationError> {
        let frequency = pattern.frequency()?;
        Ok(Self {
            watcher,
            pattern,
            source_type,
            frequency,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn record(receipt: Option<Receipt>, deadline: DateTime<Utc>) -> ExpectationRecord {
        ExpectationRecord {
            id: 1,
            watcher: WatcherName::new("test").unwrap(),
            pattern: Pattern::parse(r#"{"test":"received"}"#).unwrap(),
            source_type: SourceType::Kafka,
            frequency: Frequency::Daily,
            receipt,
            deadline,
        }
    }

    #[test]
    fn zero_payload_counts_as_satisfied() {
        let deadline = Utc.with_ymd_and_hms(2019, 6, 15, 23, 59, 59).unwrap();
        let record = record(
            Some(Receipt {
                payload: json!(0),
                received_at: Utc.with_ymd_and_hms(2019, 6, 15, 1, 0, 0).unwrap(),
            }),
            deadline,
        );
        assert!(record.is_satisfied());
        assert!(!record.is_awaiting());
    }

    #[test]
    fn expiry_is_strictly_after_deadline() {
        let deadline = Utc.with_ymd_and_hms(2019, 6, 15, 23, 59, 59).unwrap();
        let record = record(None, deadline);
        assert!(!record.is_expired_at(deadline));
        assert!(record.is_expired_at(deadline + chrono::Duration::seconds(1)));
    }

    #[test]
    fn receipt_after_deadline_is_not_valid() {
        let deadline = Utc.with_ymd_and_hms(2019, 6, 15, 23, 59, 59).unwrap();
        let now = Utc.with_ymd_and_hms(2019, 6, 15, 12, 0, 0).unwrap();
        let late = record(
            Some(Receipt {
                payload: json!({"test": 1}),
                received_at: Utc.with_ymd_and_hms(2019, 6, 16, 0, 0, 0).unwrap(),
            }),
            deadline,
        );
        assert!(!late.is_success_valid_at(now));
        assert!(!record(None, deadline).is_success_valid_at(now));
    }

    #[test]
    fn success_closes_at_deadline() {
        let deadline = Utc.with_ymd_and_hms(2019, 6, 15, 23, 59, 59).unwrap();
        let satisfied = record(
            Some(Receipt {
                payload: json!({"test": 1}),
                received_at: Utc.with_ymd_and_hms(2019, 6, 15, 1, 0, 0).unwrap(),
            }),
            deadline,
        );
        assert!(satisfied.is_success_valid_at(deadline - chrono::Duration::seconds(1)));
        assert!(!satisfied.is_success_valid_at(deadline));
    }

    #[test]
    fn declared_expectation_requires_valid_frequency() {
        let watcher = WatcherName::new("test").unwrap();
        let pattern = Pattern::parse(r#"{"frequency":"not_valid","topic":"etl-finish"}"#).unwrap();
        let err = NewExpectation::declared(watcher.clone(), pattern, SourceType::Kafka).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidFrequency { .. }));

        let pattern = Pattern::parse(r#"{"frequency":"M","topic":"etl-finish"}"#).unwrap();
        let new = NewExpectation::declared(watcher, pattern, SourceType::Base).unwrap();
        assert_eq!(new.frequency, Frequency::Monthly);
    }
}
