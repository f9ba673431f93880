//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands::arrive::ArriveArgs;
use crate::commands::carried_over::CarriedOverArgs;
use crate::commands::delete::DeleteArgs;
use crate::commands::reset::ResetArgs;
use crate::commands::show::ShowArgs;
use crate::commands::status::StatusArgs;
use crate::commands::sync::SyncArgs;
use crate::commands::unreceived::UnreceivedArgs;

/// Event sensor expectation tracker.
///
/// Keeps, per watcher, the set of messages it expects each day or month and
/// whether each one has arrived in the current window.
#[derive(Debug, Parser)]
#[command(name = "ev", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Declare the patterns a watcher expects, replacing the previous set.
    Sync(SyncArgs),

    /// Reset expectations whose window has closed.
    Reset(ResetArgs),

    /// Record that a message satisfied a pattern.
    Arrive(ArriveArgs),

    /// Print ALL_RECEIVED or NOT_ALL_RECEIVED for a watcher.
    Status(StatusArgs),

    /// List patterns still awaiting a message.
    Unreceived(UnreceivedArgs),

    /// List earlier successes missing from a set of observed messages.
    CarriedOver(CarriedOverArgs),

    /// Delete every expectation of a watcher.
    Delete(DeleteArgs),

    /// Show a watcher's records as a table.
    Show(ShowArgs),

    /// List watchers with their record counts.
    Watchers,
}
