//! Show command for a read-only table of a watcher's records.

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use clap::Args;
use ev_core::ExpectationRecord;

use super::util::{WatcherArgs, open_database};
use crate::Config;

const HEADERS: [&str; 8] = [
    "id",
    "name",
    "msg",
    "source_type",
    "frequency",
    "last_receive",
    "last_receive_time",
    "timeout",
];

/// Placeholder for unset cells.
const EMPTY_CELL: &str = "-";

#[derive(Debug, Args)]
pub struct ShowArgs {
    #[command(flatten)]
    pub target: WatcherArgs,
    /// Truncate cells longer than this many characters.
    #[arg(long)]
    pub threshold: Option<usize>,
    /// Output records as JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn run<W: Write>(writer: &mut W, args: &ShowArgs, config: &Config) -> Result<()> {
    let watcher = args.target.name()?;
    let db = open_database(config)?;
    let records = db.list_expectations(&watcher)?;

    if args.json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&records)?)?;
    } else if records.is_empty() {
        writeln!(writer, "No expectations recorded for {watcher}.")?;
    } else {
        write!(writer, "{}", format_table(&records, args.threshold))?;
    }
    Ok(())
}

/// Formats records as an aligned table, one row per record.
pub fn format_table(records: &[ExpectationRecord], threshold: Option<usize>) -> String {
    let rows: Vec<[String; 8]> = records
        .iter()
        .map(|record| row_cells(record).map(|cell| truncate(cell, threshold)))
        .collect();

    let mut widths = HEADERS.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut output = String::new();
    push_line(&mut output, &HEADERS.map(String::from), &widths);
    push_line(&mut output, &widths.map(|width| "-".repeat(width)), &widths);
    for row in &rows {
        push_line(&mut output, row, &widths);
    }
    output
}

fn row_cells(record: &ExpectationRecord) -> [String; 8] {
    let (last_receive, last_receive_time) = record.receipt.as_ref().map_or_else(
        || (EMPTY_CELL.to_string(), EMPTY_CELL.to_string()),
        |receipt| {
            (
                ev_core::canonical_key(&receipt.payload).into(),
                format_time(receipt.received_at),
            )
        },
    );
    [
        record.id.to_string(),
        record.watcher.to_string(),
        record.pattern.to_string(),
        record.source_type.to_string(),
        record.frequency.to_string(),
        last_receive,
        last_receive_time,
        format_time(record.deadline),
    ]
}

fn push_line(output: &mut String, cells: &[String; 8], widths: &[usize; 8]) {
    let last = cells.len() - 1;
    for (i, (cell, &width)) in cells.iter().zip(widths).enumerate() {
        if i == last {
            output.push_str(cell);
        } else {
            output.push_str(&format!("{cell:<width$}  "));
        }
    }
    output.push('\n');
}

/// Cuts a cell to `threshold` characters followed by `...`.
fn truncate(cell: String, threshold: Option<usize>) -> String {
    match threshold {
        // Truncate by characters, not bytes, to avoid panics on multi-byte UTF-8
        Some(limit) if limit > 0 && cell.chars().count() > limit => {
            format!("{}...", cell.chars().take(limit).collect::<String>())
        }
        _ => cell,
    }
}

fn format_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}
