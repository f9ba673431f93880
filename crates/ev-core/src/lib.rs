//! Core domain logic for event sensor expectations.
//!
//! This crate contains the fundamental types and logic for:
//! - Patterns: canonical keys for expected messages
//! - Deadlines: calendar windows per source type
//! - Reconciliation: syncing declared patterns against stored records
//! - Expiry: rolling closed windows back to awaiting
//! - Status: aggregate receipt state and carry-over queries

pub mod deadline;
pub mod expiry;
pub mod pattern;
pub mod reconcile;
pub mod record;
pub mod status;
pub mod types;

pub use deadline::{CalendarPolicy, Clock, DeadlinePolicy, FixedClock, SourcePolicies, SystemClock};
pub use expiry::{WindowReset, plan_resets};
pub use pattern::{CanonicalKey, InputError, Pattern, canonical_key};
pub use reconcile::{ReconcilePlan, plan_reconcile};
pub use record::{ExpectationRecord, NewExpectation, Receipt};
pub use status::{WatcherStatus, carried_over_successes, derive_status, unreceived};
pub use types::{Frequency, SourceType, ValidationError, WatcherName};
