//! CLI subcommand implementations.

pub mod arrive;
pub mod carried_over;
pub mod delete;
pub mod reset;
pub mod show;
pub mod status;
pub mod sync;
pub mod unreceived;
pub mod util;
pub mod watchers;
