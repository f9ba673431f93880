//! Carried-over command for successes earlier in the current window.
//!
//! A host that only rescanned recent messages passes what it observed; the
//! command lists patterns already satisfied in a window that is still open
//! but missing from that scan.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Args;
use serde_json::Value;

use super::unreceived::write_patterns;
use super::util::{ClockArgs, WatcherArgs, open_database, read_json};
use crate::Config;

#[derive(Debug, Args)]
pub struct CarriedOverArgs {
    #[command(flatten)]
    pub target: WatcherArgs,
    /// JSON file holding an array of observed messages (`-` for stdin).
    #[arg(long)]
    pub observed: PathBuf,
    /// Output as a JSON array.
    #[arg(long)]
    pub json: bool,
    #[command(flatten)]
    pub clock: ClockArgs,
}

pub fn run<W: Write>(writer: &mut W, args: &CarriedOverArgs, config: &Config) -> Result<()> {
    let watcher = args.target.name()?;
    let Value::Array(observed) = read_json(&args.observed)? else {
        bail!("observed messages must be a JSON array");
    };
    let now = args.clock.now()?;

    let db = open_database(config)?;
    let carried = db.carried_over_successes(&watcher, &observed, now)?;
    if args.json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&carried)?)?;
    } else {
        write_patterns(writer, &carried)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{TimeZone, Utc};
    use ev_core::{Pattern, SourceType, WatcherName};
    use insta::assert_snapshot;
    use serde_json::json;

    use crate::commands::util::test_config;

    fn args(observed: PathBuf, now: &str) -> CarriedOverArgs {
        CarriedOverArgs {
            target: WatcherArgs {
                watcher: "etl".to_string(),
            },
            observed,
            json: false,
            clock: ClockArgs {
                now: Some(now.to_string()),
            },
        }
    }

    #[test]
    fn carried_over_lists_earlier_successes() {
        let temp = tempfile::tempdir().unwrap();
        let config = test_config(temp.path());
        let watcher = WatcherName::new("etl").unwrap();
        let now = Utc.with_ymd_and_hms(2019, 6, 5, 0, 0, 0).unwrap();
        let desired = Pattern::parse_list(
            r#"[{"frequency":"M","test":"received"},{"frequency":"M","test":"have_received"},{"frequency":"M","test":"not_received"}]"#,
        )
        .unwrap();
        {
            let mut db = open_database(&config).unwrap();
            db.sync(&watcher, SourceType::Kafka, &desired, now).unwrap();
            db.record_arrival(&watcher, &desired[0], &json!({"n": 1}), now)
                .unwrap();
            db.record_arrival(&watcher, &desired[1], &json!({"n": 2}), now)
                .unwrap();
        }

        let observed = temp.path().join("observed.json");
        std::fs::write(&observed, r#"[{"test":"received","frequency":"M"}]"#).unwrap();

        let mut output = Vec::new();
        run(&mut output, &args(observed.clone(), "2019-06-20T12:00:00+08:00"), &config).unwrap();
        let output_text = String::from_utf8(output).unwrap();
        assert_snapshot!(output_text, @r#"{"frequency":"M","test":"have_received"}"#);

        let mut output = Vec::new();
        run(&mut output, &args(observed, "2019-07-01T00:00:00+08:00"), &config).unwrap();
        assert!(output.is_empty());
    }

    #[test]
    fn carried_over_requires_array_input() {
        let temp = tempfile::tempdir().unwrap();
        let config = test_config(temp.path());
        let observed = temp.path().join("observed.json");
        std::fs::write(&observed, r#"{"test":"received"}"#).unwrap();

        let mut output = Vec::new();
        let err = run(&mut output, &args(observed, "2019-06-20T12:00:00Z"), &config).unwrap_err();
        assert!(err.to_string().contains("must be a JSON array"));
    }
}
