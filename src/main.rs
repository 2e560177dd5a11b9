mod cli;
mod config;
mod deployment;
mod execution;
mod http;
mod logging;
mod orchestration;
mod tasks;
mod types;

use clap::Parser;
use tracing::info;

use crate::cli::{Cli, Commands, RunArgs};
use crate::config::Config;
use crate::types::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::Version) = cli.command {
        return cli::show_version().await;
    }

    // Configuration errors surface before logging exists, so they go to stderr
    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };

    crate::logging::init(
        cli.log_level_override(),
        cli.log_format_override(),
        &config.logging,
    )?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting volt-deploy-hook");

    match cli.command.clone().unwrap_or(Commands::Run(RunArgs::default())) {
        Commands::Run(args) => cli::run_server(args, config).await,
        Commands::Validate => cli::validate_config(config).await,
        Commands::Version => cli::show_version().await,
    }
}
