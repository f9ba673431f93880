//! Delete command for removing a watcher's records.

use std::io::Write;

use anyhow::Result;
use clap::Args;

use super::util::{WatcherArgs, open_database};
use crate::Config;

#[derive(Debug, Args)]
pub struct DeleteArgs {
    #[command(flatten)]
    pub target: WatcherArgs,
}

pub fn run<W: Write>(writer: &mut W, args: &DeleteArgs, config: &Config) -> Result<()> {
    let watcher = args.target.name()?;
    let mut db = open_database(config)?;
    let deleted = db.delete_watcher(&watcher)?;
    writeln!(writer, "Deleted {deleted} expectations for {watcher}")?;
    Ok(())
}
