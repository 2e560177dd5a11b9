use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, instrument, warn};

use crate::config::Config;
use crate::execution::CommandExecutor;
use crate::orchestration::DockerCli;
use crate::types::{ConfigError, Environment, Result};

#[derive(Parser)]
#[command(name = "volt-deploy-hook")]
#[command(about = "Deployment webhook for the volt docker swarm stacks")]
#[command(long_about = "
A small HTTP service that accepts authenticated deployment requests from CI,
pulls the requested images and rolls them out to the production or staging
swarm stack in the background.
")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Optional TOML configuration file; environment variables override it
    #[arg(short, long, env = "WEBHOOK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override log level
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(ValueEnum, Clone, Debug)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(ValueEnum, Clone, Debug)]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Run the webhook server (default if no subcommand given)
    Run(RunArgs),
    /// Validate the effective configuration and print it
    Validate,
    /// Show version and build information
    Version,
}

#[derive(Args, Clone, Default)]
pub struct RunArgs {
    /// Override the listen port
    #[arg(long)]
    pub port: Option<u16>,

    /// Override the bind address (e.g. "127.0.0.1")
    #[arg(long)]
    pub bind: Option<String>,

    /// Set log format
    #[arg(long)]
    pub log_format: Option<LogFormat>,
}

impl Cli {
    /// Get effective log level considering verbose/quiet flags
    pub fn effective_log_level(&self) -> Option<LogLevel> {
        if self.verbose {
            Some(LogLevel::Debug)
        } else if self.quiet {
            Some(LogLevel::Error)
        } else {
            self.log_level.clone()
        }
    }

    /// Log level requested on the command line, if any
    pub fn log_level_override(&self) -> Option<&'static str> {
        self.effective_log_level().map(|level| match level {
            LogLevel::Trace => crate::logging::level::TRACE,
            LogLevel::Debug => crate::logging::level::DEBUG,
            LogLevel::Info => crate::logging::level::INFO,
            LogLevel::Warn => crate::logging::level::WARN,
            LogLevel::Error => crate::logging::level::ERROR,
        })
    }

    /// Get log format override from CLI arguments
    pub fn log_format_override(&self) -> Option<&'static str> {
        match &self.command {
            Some(Commands::Run(args)) => args.log_format.as_ref().map(|fmt| match fmt {
                LogFormat::Json => crate::logging::format::JSON,
                LogFormat::Pretty => crate::logging::format::PRETTY,
                LogFormat::Compact => crate::logging::format::COMPACT,
            }),
            _ => None,
        }
    }
}

impl RunArgs {
    /// Apply command line overrides on top of file and environment settings
    pub fn apply(&self, mut config: Config) -> Config {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(bind) = &self.bind {
            config.server.bind = bind.clone();
        }
        config
    }
}

/// Run the webhook server
#[instrument(skip_all)]
pub async fn run_server(args: RunArgs, config: Config) -> Result<()> {
    let config = args.apply(config);
    config.validate()?;

    if config.uses_placeholder_token() {
        warn!(
            variable = crate::config::env::TOKEN,
            "Webhook token is the default placeholder, set a real secret before exposing this service"
        );
    }

    let timeout = match config.deploy.command_timeout {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    };
    let executor = CommandExecutor::new(&config.deploy.working_dir, timeout);
    let client = Arc::new(DockerCli::new(config.deploy.docker_bin.clone(), executor));

    info!(
        listen = %config.listen_address(),
        token = %config.auth.token.masked(),
        working_dir = %config.deploy.working_dir,
        docker_bin = %config.deploy.docker_bin,
        queue_capacity = config.deploy.queue_capacity,
        "Starting deployment webhook"
    );

    let shutdown_signal = setup_shutdown_signal();
    crate::http::start_server(config, client, shutdown_signal).await
}

/// Validate the effective configuration
#[instrument(skip_all)]
pub async fn validate_config(config: Config) -> Result<()> {
    info!("Validating configuration...");

    if let Err(e) = config.validate() {
        error!(error = %e, "Configuration validation failed");
        return Err(e);
    }

    if config.uses_placeholder_token() {
        warn!("Webhook token is the default placeholder");
    }

    // Missing directories and compose files only matter once a deployment runs
    let working_dir = Path::new(&config.deploy.working_dir);
    if !working_dir.is_dir() {
        warn!(
            working_dir = %working_dir.display(),
            "Working directory does not exist on this host"
        );
    } else {
        for environment in Environment::ALL {
            let target = config.deploy.target(environment);
            let compose = working_dir.join(&target.compose_file);
            if !compose.is_file() {
                warn!(
                    environment = %environment,
                    compose_file = %compose.display(),
                    "Compose file not found"
                );
            }
        }
    }

    let rendered = toml::to_string_pretty(&config).map_err(|e| ConfigError::Invalid {
        message: format!("Failed to render configuration: {}", e),
    })?;
    println!("{}", rendered);

    info!("Configuration is valid");
    Ok(())
}

/// Show version and build information
#[instrument]
pub async fn show_version() -> Result<()> {
    println!("volt-deploy-hook {}", env!("CARGO_PKG_VERSION"));
    println!("Description: {}", env!("CARGO_PKG_DESCRIPTION"));
    println!("License: {}", env!("CARGO_PKG_LICENSE"));
    println!();

    println!("Build Information:");
    println!(
        "  Build Profile: {}",
        if cfg!(debug_assertions) {
            "debug"
        } else {
            "release"
        }
    );
    println!();

    println!("Runtime Information:");
    println!("  OS: {}", std::env::consts::OS);
    println!("  Architecture: {}", std::env::consts::ARCH);

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
pub async fn setup_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C");
        },
        _ = terminate => {
            info!("Received SIGTERM");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_no_subcommand() {
        let cli = Cli::try_parse_from(["volt-deploy-hook"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.log_level_override().is_none());
        assert!(cli.log_format_override().is_none());
    }

    #[test]
    fn test_run_arguments() {
        let cli = Cli::try_parse_from([
            "volt-deploy-hook",
            "run",
            "--port",
            "9100",
            "--bind",
            "127.0.0.1",
            "--log-format",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.log_format_override(), Some("json"));
        let Some(Commands::Run(args)) = cli.command else {
            panic!("Expected run subcommand");
        };
        let config = args.apply(Config::default());
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.bind, "127.0.0.1");
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        assert!(Cli::try_parse_from(["volt-deploy-hook", "run", "--port", "70000"]).is_err());
    }

    #[test]
    fn test_verbose_and_quiet() {
        let cli = Cli::try_parse_from(["volt-deploy-hook", "-v"]).unwrap();
        assert_eq!(cli.log_level_override(), Some("debug"));

        let cli = Cli::try_parse_from(["volt-deploy-hook", "-q"]).unwrap();
        assert_eq!(cli.log_level_override(), Some("error"));

        let cli = Cli::try_parse_from(["volt-deploy-hook", "--log-level", "warn"]).unwrap();
        assert_eq!(cli.log_level_override(), Some("warn"));

        assert!(Cli::try_parse_from(["volt-deploy-hook", "-v", "-q"]).is_err());
    }

    #[test]
    fn test_config_path() {
        let cli =
            Cli::try_parse_from(["volt-deploy-hook", "--config", "/etc/volt/hook.toml", "validate"])
                .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/volt/hook.toml")));
        assert!(matches!(cli.command, Some(Commands::Validate)));
    }

    #[tokio::test]
    async fn test_validate_config_accepts_defaults() {
        let mut config = Config::default();
        let dir = tempfile::tempdir().unwrap();
        config.deploy.working_dir = dir.path().to_string_lossy().to_string();
        assert!(validate_config(config).await.is_ok());
    }

    #[tokio::test]
    async fn test_validate_config_rejects_invalid() {
        let mut config = Config::default();
        config.deploy.queue_capacity = 0;
        assert!(validate_config(config).await.is_err());
    }
}
