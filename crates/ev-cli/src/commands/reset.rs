//! Reset command for rolling expired windows over.

use std::io::Write;

use anyhow::Result;
use clap::Args;

use super::util::{ClockArgs, WatcherArgs, open_database};
use crate::Config;

#[derive(Debug, Args)]
pub struct ResetArgs {
    #[command(flatten)]
    pub target: WatcherArgs,
    #[command(flatten)]
    pub clock: ClockArgs,
}

pub fn run<W: Write>(writer: &mut W, args: &ResetArgs, config: &Config) -> Result<()> {
    let watcher = args.target.name()?;
    let now = args.clock.now()?;

    let mut db = open_database(config)?;
    let reset = db.reset_expired(&watcher, now)?;
    writeln!(writer, "Reset {reset} expired expectations for {watcher}")?;
    Ok(())
}
