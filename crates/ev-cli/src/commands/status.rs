//! Status command for a watcher's aggregate receipt state.

use std::io::Write;

use anyhow::Result;
use clap::Args;

use super::util::{WatcherArgs, open_database};
use crate::Config;

#[derive(Debug, Args)]
pub struct StatusArgs {
    #[command(flatten)]
    pub target: WatcherArgs,
}

pub fn run<W: Write>(writer: &mut W, args: &StatusArgs, config: &Config) -> Result<()> {
    let watcher = args.target.name()?;
    let db = open_database(config)?;
    writeln!(writer, "{}", db.status(&watcher)?)?;
    Ok(())
}
