//! Declarative sync of desired patterns against stored records.

use std::collections::HashSet;

use crate::pattern::{CanonicalKey, Pattern};
use crate::record::ExpectationRecord;

/// Changes needed to make a watcher's records match its declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// Ids of records whose pattern is no longer declared.
    pub delete: Vec<i64>,
    /// Declared patterns with no surviving record, in declaration order.
    pub insert: Vec<Pattern>,
}

impl ReconcilePlan {
    pub fn is_noop(&self) -> bool {
        self.delete.is_empty() && self.insert.is_empty()
    }
}

/// Computes the set difference between stored and desired patterns.
///
/// Canonically equal entries in `desired` collapse to a single insert.
pub fn plan_reconcile(existing: &[ExpectationRecord], desired: &[Pattern]) -> ReconcilePlan {
    let desired_keys: HashSet<CanonicalKey> = desired.iter().map(Pattern::key).collect();

    let mut delete = Vec::new();
    let mut present: HashSet<CanonicalKey> = HashSet::new();
    for record in existing {
        let key = record.key();
        if desired_keys.contains(&key) {
            present.insert(key);
        } else {
            delete.push(record.id);
        }
    }

    let mut insert = Vec::new();
    for pattern in desired {
        if present.insert(pattern.key()) {
            insert.push(pattern.clone());
        } else {
            tracing::trace!(pattern = %pattern, "pattern already has a record");
        }
    }

    ReconcilePlan { delete, insert }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Frequency, SourceType, WatcherName};
    use chrono::{TimeZone, Utc};

    fn pattern(text: &str) -> Pattern {
        Pattern::parse(text).unwrap()
    }

    fn stored(id: i64, text: &str) -> ExpectationRecord {
        ExpectationRecord {
            id,
            watcher: WatcherName::new("test").unwrap(),
            pattern: pattern(text),
            source_type: SourceType::Kafka,
            frequency: Frequency::Daily,
            receipt: None,
            deadline: Utc.with_ymd_and_hms(2019, 6, 15, 23, 59, 59).unwrap(),
        }
    }

    #[test]
    fn empty_store_inserts_everything() {
        let desired = vec![pattern(r#"{"a":1}"#), pattern(r#"{"b":2}"#)];
        let plan = plan_reconcile(&[], &desired);
        assert!(plan.delete.is_empty());
        assert_eq!(plan.insert, desired);
    }

    #[test]
    fn removes_undeclared_and_adds_new() {
        let existing = vec![
            stored(1, r#"{"task_id":"tbla","frequency":"D"}"#),
            stored(2, r#"{"task_id":"tblc","frequency":"M"}"#),
        ];
        let desired = vec![
            pattern(r#"{"task_id":"tblb","frequency":"D"}"#),
            pattern(r#"{"frequency":"M","task_id":"tblc"}"#),
            pattern(r#"{"job_name":"jn1","frequency":"D"}"#),
        ];

        let plan = plan_reconcile(&existing, &desired);
        assert_eq!(plan.delete, vec![1]);
        assert_eq!(plan.insert, vec![desired[0].clone(), desired[2].clone()]);
    }

    #[test]
    fn matching_declaration_is_noop() {
        let existing = vec![stored(1, r#"{"a":1}"#), stored(2, r#"{"b":2}"#)];
        let desired = vec![pattern(r#"{"b":2}"#), pattern(r#"{"a":1}"#)];
        assert!(plan_reconcile(&existing, &desired).is_noop());
    }

    #[test]
    fn duplicate_declarations_collapse() {
        let desired = vec![
            pattern(r#"{"a":1,"b":2}"#),
            pattern(r#"{"b":2,"a":1}"#),
        ];
        let plan = plan_reconcile(&[], &desired);
        assert_eq!(plan.insert.len(), 1);
    }

    #[test]
    fn empty_declaration_deletes_everything() {
        let existing = vec![stored(7, r#"{"a":1}"#), stored(9, r#"{"b":2}"#)];
        let plan = plan_reconcile(&existing, &[]);
        assert_eq!(plan.delete, vec![7, 9]);
        assert!(plan.insert.is_empty());
    }
}
