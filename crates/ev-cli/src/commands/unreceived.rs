//! Unreceived command for listing patterns still awaiting a message.

use std::io::Write;

use anyhow::Result;
use clap::Args;
use ev_core::Pattern;

use super::util::{WatcherArgs, open_database};
use crate::Config;

#[derive(Debug, Args)]
pub struct UnreceivedArgs {
    #[command(flatten)]
    pub target: WatcherArgs,
    /// Output as a JSON array.
    #[arg(long)]
    pub json: bool,
}

pub fn run<W: Write>(writer: &mut W, args: &UnreceivedArgs, config: &Config) -> Result<()> {
    let watcher = args.target.name()?;
    let db = open_database(config)?;
    let patterns = db.unreceived(&watcher)?;

    if args.json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&patterns)?)?;
    } else if patterns.is_empty() {
        writeln!(writer, "All expectations received.")?;
    } else {
        write_patterns(writer, &patterns)?;
    }
    Ok(())
}

/// Writes one canonical pattern per line.
pub fn write_patterns<W: Write>(writer: &mut W, patterns: &[Pattern]) -> Result<()> {
    for pattern in patterns {
        writeln!(writer, "{pattern}")?;
    }
    Ok(())
}
