//! Rolling expired windows back to awaiting.

use chrono::{DateTime, Utc};

use crate::deadline::SourcePolicies;
use crate::record::ExpectationRecord;

/// A record that must be cleared and given a fresh deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowReset {
    pub id: i64,
    pub deadline: DateTime<Utc>,
}

/// Plans resets for every record whose deadline is before `now`.
///
/// The new deadline is computed from the same `now`, so the rollover is
/// deterministic for a caller-supplied time. Records not yet due are left out.
pub fn plan_resets(
    records: &[ExpectationRecord],
    policies: &SourcePolicies,
    now: DateTime<Utc>,
) -> Vec<WindowReset> {
    records
        .iter()
        .filter(|record| record.is_expired_at(now))
        .map(|record| WindowReset {
            id: record.id,
            deadline: policies.deadline_for(
                record.source_type,
                record.frequency,
                &record.pattern,
                now,
            ),
        })
        .collect()
}
