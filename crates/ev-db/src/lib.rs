//! Storage layer for event sensor expectations.
//!
//! Persists one row per (watcher, pattern) using `rusqlite` and exposes the
//! expectation operations as single transactions.
//!
//! # Concurrency
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! Mutating operations take `&mut self`, so callers sharing one `Database` are
//! serialized by the borrow checker or by a `Mutex<Database>`.
//!
//! Across processes, every mutating operation opens an `IMMEDIATE` transaction:
//! the write lock is taken before the watcher's records are read, so two
//! read-modify-write sequences for the same watcher cannot interleave. A failed
//! operation rolls back and leaves no partial changes behind.
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! Timestamps are stored as TEXT in RFC 3339 format with millisecond precision
//! (e.g., `2019-06-15T23:59:59.000Z`). The fixed width keeps lexicographic
//! ordering equal to chronological ordering.
//!
//! ## Pattern Storage
//!
//! The `pattern` column stores the canonical JSON text of a pattern (keys
//! sorted, no whitespace). Equal patterns therefore have equal column values,
//! which lets `UNIQUE (watcher, pattern)` enforce one record per pattern and
//! lets arrivals match with a plain equality filter.

use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, Transaction, TransactionBehavior, params};
use serde_json::Value;
use thiserror::Error;

use ev_core::{
    ExpectationRecord, NewExpectation, Pattern, Receipt, SourcePolicies, SourceType,
    ValidationError, WatcherName, WatcherStatus, WindowReset, canonical_key,
    carried_over_successes, derive_status, plan_reconcile, plan_resets, unreceived,
};

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// The store could not complete the operation.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A record failed validation before reaching storage.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    /// Failed to parse a stored timestamp.
    #[error("invalid timestamp for expectation {id}: {timestamp}")]
    TimestampParse {
        id: i64,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// A stored row does not describe a valid expectation.
    #[error("invalid expectation {id}: {message}")]
    InvalidRecord { id: i64, message: String },
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for concurrency considerations.
pub struct Database {
    conn: Connection,
    policies: SourcePolicies,
}

/// Summary of a `sync` pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncOutcome {
    pub inserted: usize,
    pub deleted: usize,
    pub reset: usize,
}

/// Record counts for one watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatcherSummary {
    pub name: String,
    pub expectations: usize,
    pub awaiting: usize,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    /// Deadlines use UTC calendar windows until [`Self::with_policies`] is applied.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, DbError> {
        let db = Self {
            conn,
            policies: SourcePolicies::default(),
        };
        db.init()?;
        Ok(db)
    }

    /// Replaces the deadline policies bound to each source type.
    #[must_use]
    pub fn with_policies(mut self, policies: SourcePolicies) -> Self {
        self.policies = policies;
        self
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            -- Expectations table: one row per (watcher, pattern)
            -- pattern: canonical JSON text of the expected message
            -- last_receive/last_receive_time: both NULL (awaiting) or both set (satisfied)
            -- deadline: end of the current expectation window, ISO 8601
            CREATE TABLE IF NOT EXISTS expectations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                watcher TEXT NOT NULL,
                pattern TEXT NOT NULL,
                source_type TEXT NOT NULL CHECK (source_type IN ('base', 'kafka')),
                frequency TEXT NOT NULL CHECK (frequency IN ('D', 'M')),
                last_receive TEXT,
                last_receive_time TEXT,
                deadline TEXT NOT NULL,
                UNIQUE (watcher, pattern),
                CHECK ((last_receive IS NULL) = (last_receive_time IS NULL))
            );

            CREATE INDEX IF NOT EXISTS idx_expectations_deadline ON expectations(watcher, deadline);
            ",
        )?;
        Ok(())
    }

    /// Syncs a watcher's records with the patterns it declares.
    ///
    /// Records whose pattern is no longer declared are deleted, new patterns
    /// get awaiting records with a fresh deadline, and surviving records past
    /// their deadline are reset. Every declared pattern is validated before
    /// the store is touched.
    pub fn sync(
        &mut self,
        watcher: &WatcherName,
        source_type: SourceType,
        desired: &[Pattern],
        now: DateTime<Utc>,
    ) -> Result<SyncOutcome, DbError> {
        for pattern in desired {
            pattern.frequency()?;
        }

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let existing = load_records(&tx, watcher)?;
        let plan = plan_reconcile(&existing, desired);

        let deleted: HashSet<i64> = plan.delete.iter().copied().collect();
        let survivors: Vec<ExpectationRecord> = existing
            .into_iter()
            .filter(|record| !deleted.contains(&record.id))
            .collect();
        let resets = plan_resets(&survivors, &self.policies, now);

        {
            let mut stmt = tx.prepare("DELETE FROM expectations WHERE id = ?")?;
            for id in &plan.delete {
                stmt.execute([id])?;
            }
        }
        let mut inserted = 0;
        for pattern in plan.insert {
            let new = NewExpectation::declared(watcher.clone(), pattern, source_type)?;
            let deadline =
                self.policies
                    .deadline_for(new.source_type, new.frequency, &new.pattern, now);
            insert_row(&tx, &new, None, deadline)?;
            inserted += 1;
        }
        apply_resets(&tx, &resets)?;
        tx.commit()?;

        let outcome = SyncOutcome {
            inserted,
            deleted: deleted.len(),
            reset: resets.len(),
        };
        if outcome == SyncOutcome::default() {
            tracing::debug!(watcher = %watcher, "expectations already in sync");
        } else {
            tracing::info!(
                watcher = %watcher,
                inserted = outcome.inserted,
                deleted = outcome.deleted,
                reset = outcome.reset,
                "synced expectations"
            );
        }
        Ok(outcome)
    }

    /// Resets every record of `watcher` whose deadline is before `now`.
    ///
    /// Reset records lose their received fields and get the deadline of the
    /// window containing `now`. Returns the number of records reset.
    pub fn reset_expired(
        &mut self,
        watcher: &WatcherName,
        now: DateTime<Utc>,
    ) -> Result<usize, DbError> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let records = load_records(&tx, watcher)?;
        let resets = plan_resets(&records, &self.policies, now);
        apply_resets(&tx, &resets)?;
        tx.commit()?;

        if !resets.is_empty() {
            tracing::info!(watcher = %watcher, reset = resets.len(), "reset expired expectations");
        }
        Ok(resets.len())
    }

    /// Records that `payload` satisfied `matched` for `watcher`.
    ///
    /// The deadline is left unchanged. Returns the number of records updated;
    /// zero means no record of this watcher has that pattern.
    pub fn record_arrival(
        &mut self,
        watcher: &WatcherName,
        matched: &Pattern,
        payload: &Value,
        now: DateTime<Utc>,
    ) -> Result<usize, DbError> {
        let updated = self.conn.execute(
            "
            UPDATE expectations
            SET last_receive = ?, last_receive_time = ?
            WHERE watcher = ? AND pattern = ?
            ",
            params![
                canonical_key(payload).as_str(),
                format_timestamp(now),
                watcher.as_str(),
                matched.key().as_str(),
            ],
        )?;
        if updated == 0 {
            tracing::warn!(watcher = %watcher, pattern = %matched, "arrival matched no expectation");
        } else {
            tracing::debug!(watcher = %watcher, pattern = %matched, "recorded arrival");
        }
        Ok(updated)
    }

    /// Aggregate receipt status of a watcher.
    pub fn status(&self, watcher: &WatcherName) -> Result<WatcherStatus, DbError> {
        Ok(derive_status(&self.list_expectations(watcher)?))
    }

    /// Patterns still awaiting a message.
    pub fn unreceived(&self, watcher: &WatcherName) -> Result<Vec<Pattern>, DbError> {
        Ok(unreceived(&self.list_expectations(watcher)?))
    }

    /// Patterns satisfied earlier in a window still open at `now` that are
    /// missing from `observed`.
    pub fn carried_over_successes(
        &self,
        watcher: &WatcherName,
        observed: &[Value],
        now: DateTime<Utc>,
    ) -> Result<Vec<Pattern>, DbError> {
        Ok(carried_over_successes(
            &self.list_expectations(watcher)?,
            observed,
            now,
        ))
    }

    /// Deletes every record of a watcher. Returns the number of records removed.
    pub fn delete_watcher(&mut self, watcher: &WatcherName) -> Result<usize, DbError> {
        let deleted = self.conn.execute(
            "DELETE FROM expectations WHERE watcher = ?",
            [watcher.as_str()],
        )?;
        tracing::info!(watcher = %watcher, deleted, "deleted watcher expectations");
        Ok(deleted)
    }

    /// Lists a watcher's records ordered by ID.
    pub fn list_expectations(
        &self,
        watcher: &WatcherName,
    ) -> Result<Vec<ExpectationRecord>, DbError> {
        load_records(&self.conn, watcher)
    }

    /// Lists every watcher with its record counts, ordered by name.
    pub fn list_watchers(&self) -> Result<Vec<WatcherSummary>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT watcher, COUNT(*), SUM(CASE WHEN last_receive_time IS NULL THEN 1 ELSE 0 END)
            FROM expectations
            GROUP BY watcher
            ORDER BY watcher ASC
            ",
        )?;
        let rows = stmt.query_map([], |row| {
            let expectations: i64 = row.get(1)?;
            let awaiting: i64 = row.get(2)?;
            Ok(WatcherSummary {
                name: row.get(0)?,
                expectations: usize::try_from(expectations).unwrap_or_default(),
                awaiting: usize::try_from(awaiting).unwrap_or_default(),
            })
        })?;
        let mut watchers = Vec::new();
        for row in rows {
            watchers.push(row?);
        }
        Ok(watchers)
    }

    /// Inserts a record with explicit state, bypassing declaration.
    ///
    /// Hosts use this to seed fixtures or migrate records. Returns the new ID.
    pub fn insert_expectation(
        &mut self,
        expectation: &NewExpectation,
        receipt: Option<&Receipt>,
        deadline: DateTime<Utc>,
    ) -> Result<i64, DbError> {
        let tx = self.conn.transaction()?;
        let id = insert_row(&tx, expectation, receipt, deadline)?;
        tx.commit()?;
        Ok(id)
    }
}

#[derive(Debug)]
struct ExpectationRow {
    id: i64,
    watcher: String,
    pattern: String,
    source_type: String,
    frequency: String,
    last_receive: Option<String>,
    last_receive_time: Option<String>,
    deadline: String,
}

impl ExpectationRow {
    fn into_record(self) -> Result<ExpectationRecord, DbError> {
        let id = self.id;
        let invalid = |message: String| DbError::InvalidRecord { id, message };

        let pattern = Pattern::parse(&self.pattern).map_err(|err| invalid(err.to_string()))?;
        let receipt = match (self.last_receive, self.last_receive_time) {
            (Some(payload), Some(received_at)) => Some(Receipt {
                payload: serde_json::from_str(&payload).map_err(|err| invalid(err.to_string()))?,
                received_at: parse_timestamp(&received_at, id)?,
            }),
            (None, None) => None,
            _ => return Err(invalid("received fields must be set together".to_string())),
        };

        Ok(ExpectationRecord {
            id,
            watcher: WatcherName::new(self.watcher).map_err(|err| invalid(err.to_string()))?,
            pattern,
            source_type: self
                .source_type
                .parse()
                .map_err(|err: ValidationError| invalid(err.to_string()))?,
            frequency: self
                .frequency
                .parse()
                .map_err(|err: ValidationError| invalid(err.to_string()))?,
            receipt,
            deadline: parse_timestamp(&self.deadline, id)?,
        })
    }
}

fn load_records(
    conn: &Connection,
    watcher: &WatcherName,
) -> Result<Vec<ExpectationRecord>, DbError> {
    let mut stmt = conn.prepare(
        "
        SELECT id, watcher, pattern, source_type, frequency, last_receive, last_receive_time, deadline
        FROM expectations
        WHERE watcher = ?
        ORDER BY id ASC
        ",
    )?;
    let rows = stmt.query_map([watcher.as_str()], |row| {
        Ok(ExpectationRow {
            id: row.get(0)?,
            watcher: row.get(1)?,
            pattern: row.get(2)?,
            source_type: row.get(3)?,
            frequency: row.get(4)?,
            last_receive: row.get(5)?,
            last_receive_time: row.get(6)?,
            deadline: row.get(7)?,
        })
    })?;
    let mut records = Vec::new();
    for row in rows {
        records.push(row?.into_record()?);
    }
    Ok(records)
}

fn insert_row(
    tx: &Transaction<'_>,
    expectation: &NewExpectation,
    receipt: Option<&Receipt>,
    deadline: DateTime<Utc>,
) -> Result<i64, DbError> {
    tx.execute(
        "
        INSERT INTO expectations
        (watcher, pattern, source_type, frequency, last_receive, last_receive_time, deadline)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ",
        params![
            expectation.watcher.as_str(),
            expectation.pattern.key().as_str(),
            expectation.source_type.as_str(),
            expectation.frequency.as_str(),
            receipt.map(|receipt| String::from(canonical_key(&receipt.payload))),
            receipt.map(|receipt| format_timestamp(receipt.received_at)),
            format_timestamp(deadline),
        ],
    )?;
    Ok(tx.last_insert_rowid())
}

fn apply_resets(tx: &Transaction<'_>, resets: &[WindowReset]) -> Result<(), DbError> {
    let mut stmt = tx.prepare(
        "
        UPDATE expectations
        SET last_receive = NULL, last_receive_time = NULL, deadline = ?
        WHERE id = ?
        ",
    )?;
    for reset in resets {
        stmt.execute(params![format_timestamp(reset.deadline), reset.id])?;
    }
    Ok(())
}

fn parse_timestamp(timestamp: &str, id: i64) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            id,
            timestamp: timestamp.to_string(),
            source,
        })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}
