//! Watchers command for listing known watchers.

use std::io::Write;

use anyhow::Result;

use super::util::open_database;
use crate::Config;

/// Runs the watchers command.
pub fn run<W: Write>(writer: &mut W, config: &Config) -> Result<()> {
    let db = open_database(config)?;
    let watchers = db.list_watchers()?;

    if watchers.is_empty() {
        writeln!(
            writer,
            "No watchers registered yet. Run 'ev sync' to declare expectations."
        )?;
        return Ok(());
    }

    writeln!(writer, "{:<24} {:>12} {:>9}", "WATCHER", "EXPECTATIONS", "AWAITING")?;
    for watcher in &watchers {
        writeln!(
            writer,
            "{:<24} {:>12} {:>9}",
            watcher.name, watcher.expectations, watcher.awaiting
        )?;
    }
    Ok(())
}
