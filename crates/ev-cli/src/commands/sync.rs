//! Sync command for declaring a watcher's expected patterns.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use ev_core::{Pattern, SourceType};

use super::util::{ClockArgs, WatcherArgs, open_database, read_json};
use crate::Config;

#[derive(Debug, Args)]
pub struct SyncArgs {
    #[command(flatten)]
    pub target: WatcherArgs,
    /// JSON file holding an array of pattern objects (`-` for stdin).
    #[arg(long)]
    pub patterns: PathBuf,
    /// Source type for new records (defaults to the configured one).
    #[arg(long)]
    pub source: Option<SourceType>,
    #[command(flatten)]
    pub clock: ClockArgs,
}

pub fn run<W: Write>(writer: &mut W, args: &SyncArgs, config: &Config) -> Result<()> {
    let watcher = args.target.name()?;
    let desired = Pattern::list_from_value(read_json(&args.patterns)?)
        .context("failed to read declared patterns")?;
    let source = args.source.unwrap_or(config.source_type);
    let now = args.clock.now()?;

    let mut db = open_database(config)?;
    let outcome = db.sync(&watcher, source, &desired, now)?;
    writeln!(
        writer,
        "Synced {watcher}: {} inserted, {} deleted, {} reset",
        outcome.inserted, outcome.deleted, outcome.reset
    )?;
    Ok(())
}
