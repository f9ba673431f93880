//! Arrive command for recording that a message satisfied a pattern.

use std::io::Write;

use anyhow::{Context, Result};
use clap::Args;
use ev_core::Pattern;
use serde_json::Value;

use super::util::{ClockArgs, WatcherArgs, open_database};
use crate::Config;

#[derive(Debug, Args)]
pub struct ArriveArgs {
    #[command(flatten)]
    pub target: WatcherArgs,
    /// Matched pattern as a JSON object.
    #[arg(long)]
    pub pattern: String,
    /// Message payload as JSON.
    #[arg(long)]
    pub payload: String,
    #[command(flatten)]
    pub clock: ClockArgs,
}

pub fn run<W: Write>(writer: &mut W, args: &ArriveArgs, config: &Config) -> Result<()> {
    let watcher = args.target.name()?;
    let matched = Pattern::parse(&args.pattern).context("invalid --pattern")?;
    let payload: Value = serde_json::from_str(&args.payload).context("invalid --payload")?;
    let now = args.clock.now()?;

    let mut db = open_database(config)?;
    let updated = db.record_arrival(&watcher, &matched, &payload, now)?;
    writeln!(writer, "Updated {updated} expectations for {watcher}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{TimeZone, Utc};
    use ev_core::{SourceType, WatcherName, WatcherStatus};
    use ev_db::Database;
    use insta::assert_snapshot;

    use crate::commands::util::test_config;

    fn args(pattern: &str, payload: &str) -> ArriveArgs {
        ArriveArgs {
            target: WatcherArgs {
                watcher: "etl".to_string(),
            },
            pattern: pattern.to_string(),
            payload: payload.to_string(),
            clock: ClockArgs {
                now: Some("2019-06-05T09:00:00+08:00".to_string()),
            },
        }
    }

    #[test]
    fn arrive_marks_matching_pattern() {
        let temp = tempfile::tempdir().unwrap();
        let config = test_config(temp.path());
        let watcher = WatcherName::new("etl").unwrap();
        {
            let mut db = open_database(&config).unwrap();
            let desired = Pattern::parse_list(r#"[{"frequency":"D","db":"db0","table":"tbl0"}]"#)
                .unwrap();
            let now = Utc.with_ymd_and_hms(2019, 6, 5, 0, 0, 0).unwrap();
            db.sync(&watcher, SourceType::Kafka, &desired, now).unwrap();
        }

        let mut output = Vec::new();
        run(
            &mut output,
            &args(r#"{"table":"tbl0","db":"db0","frequency":"D"}"#, "0"),
            &config,
        )
        .unwrap();
        run(
            &mut output,
            &args(r#"{"frequency":"D","db":"db1"}"#, r#"{"ok":true}"#),
            &config,
        )
        .unwrap();

        let output = String::from_utf8(output).unwrap();
        assert_snapshot!(output, @r"
        Updated 1 expectations for etl
        Updated 0 expectations for etl
        ");

        let db = Database::open(&config.database_path).unwrap();
        assert_eq!(db.status(&watcher).unwrap(), WatcherStatus::AllReceived);
    }

    #[test]
    fn arrive_rejects_non_object_pattern() {
        let temp = tempfile::tempdir().unwrap();
        let config = test_config(temp.path());

        let mut output = Vec::new();
        let err = run(&mut output, &args("[1, 2]", "{}"), &config).unwrap_err();
        assert!(err.to_string().contains("invalid --pattern"));
    }
}
