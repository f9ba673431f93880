//! Shared utilities for CLI commands.

use std::io::Read;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::Args;
use ev_core::{Clock, SystemClock, WatcherName};
use ev_db::Database;
use regex::Regex;
use serde_json::Value;

use crate::Config;

/// Pre-compiled regex for relative time parsing.
static RELATIVE_TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s+(minute|hour|day|week)s?\s+ago$").unwrap());

/// Conservative bounds for relative time parsing (~1000 years in minutes).
const MAX_RELATIVE_MINUTES: i64 = 1000 * 365 * 24 * 60;

/// Selects the watcher a command operates on.
#[derive(Debug, Clone, Args)]
pub struct WatcherArgs {
    /// Watcher (sensor) name.
    #[arg(short, long)]
    pub watcher: String,
}

impl WatcherArgs {
    pub fn name(&self) -> Result<WatcherName> {
        WatcherName::new(self.watcher.clone()).context("invalid watcher name")
    }
}

/// Overrides the clock for commands that depend on the current time.
#[derive(Debug, Clone, Default, Args)]
pub struct ClockArgs {
    /// Evaluate at this time instead of now (ISO 8601 or e.g. '2 hours ago').
    #[arg(long)]
    pub now: Option<String>,
}

impl ClockArgs {
    pub fn now(&self) -> Result<DateTime<Utc>> {
        match &self.now {
            Some(value) => parse_datetime(value, &SystemClock),
            None => Ok(SystemClock.now()),
        }
    }
}

/// Opens the configured database with calendar windows in the configured zone,
/// ensuring the parent directory exists.
pub fn open_database(config: &Config) -> Result<Database> {
    if let Some(parent) = config
        .database_path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
    {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;
    Ok(db.with_policies(config.policies()?))
}

/// Reads JSON from a file, or from stdin when the path is `-`.
pub fn read_json(path: &Path) -> Result<Value> {
    let mut text = String::new();
    if path.as_os_str() == "-" {
        std::io::stdin()
            .read_to_string(&mut text)
            .context("failed to read stdin")?;
    } else {
        text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
    }
    serde_json::from_str(&text).with_context(|| format!("invalid JSON in {}", path.display()))
}

/// Parse a datetime string as either ISO 8601 or relative time.
///
/// Supports:
/// - ISO 8601: "2019-06-05T08:00:00+08:00"
/// - Relative: "2 hours ago", "30 minutes ago", "1 day ago", "1 week ago"
///
/// Relative times are measured back from `clock`.
pub fn parse_datetime(s: &str, clock: &dyn Clock) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    let Some(caps) = RELATIVE_TIME_RE.captures(s) else {
        anyhow::bail!(
            "Invalid datetime: {s}. Use ISO 8601 (e.g., 2019-06-05T08:00:00Z) or relative (e.g., '2 hours ago')"
        );
    };

    let n: i64 = caps[1]
        .parse()
        .context("failed to parse number in relative time")?;

    let (max_for_unit, minutes_per_unit) = match &caps[2] {
        "minute" => (MAX_RELATIVE_MINUTES, 1),
        "hour" => (MAX_RELATIVE_MINUTES / 60, 60),
        "day" => (MAX_RELATIVE_MINUTES / (60 * 24), 60 * 24),
        "week" => (MAX_RELATIVE_MINUTES / (60 * 24 * 7), 60 * 24 * 7),
        unit => anyhow::bail!("Unknown time unit: {unit}"),
    };

    if n > max_for_unit {
        anyhow::bail!("Relative time value too large: {n} {}", &caps[2]);
    }

    Ok(clock.now() - Duration::minutes(n * minutes_per_unit))
}

#[cfg(test)]
pub fn test_config(dir: &Path) -> Config {
    Config {
        database_path: dir.join("ev.db"),
        timezone: "Asia/Taipei".to_string(),
        source_type: ev_core::SourceType::Kafka,
    }
}
