use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use envsensor_cli::cli::{Cli, Commands};
use envsensor_cli::commands::{cmd_forward, cmd_set_interval, cmd_sync};
use envsensor_cli::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    human_panic::setup_panic!();

    let cli = Cli::parse();

    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Bad configuration stops the run before any device is touched.
    let config = Config::load_from(cli.config.as_deref()).context("Failed to load configuration")?;
    config.validate()?;

    match cli.command {
        Commands::Sync(args) => cmd_sync(args, &config, cli.quiet).await,
        Commands::Forward(args) => cmd_forward(args, &config, cli.quiet).await,
        Commands::SetInterval(args) => cmd_set_interval(args, &config, cli.quiet).await,
    }
}
