use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ev_cli::commands::{
    arrive, carried_over, delete, reset, show, status, sync, unreceived, watchers,
};
use ev_cli::{Cli, Commands, Config};

fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let Some(command) = &cli.command else {
        // No subcommand, show help
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let config = load_config(cli.config.as_deref())?;
    let mut stdout = std::io::stdout().lock();
    match command {
        Commands::Sync(args) => sync::run(&mut stdout, args, &config)?,
        Commands::Reset(args) => reset::run(&mut stdout, args, &config)?,
        Commands::Arrive(args) => arrive::run(&mut stdout, args, &config)?,
        Commands::Status(args) => status::run(&mut stdout, args, &config)?,
        Commands::Unreceived(args) => unreceived::run(&mut stdout, args, &config)?,
        Commands::CarriedOver(args) => carried_over::run(&mut stdout, args, &config)?,
        Commands::Delete(args) => delete::run(&mut stdout, args, &config)?,
        Commands::Show(args) => show::run(&mut stdout, args, &config)?,
        Commands::Watchers => watchers::run(&mut stdout, &config)?,
    }
    stdout.flush()?;

    Ok(())
}
