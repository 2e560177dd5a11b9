//! Logging setup for the deployment webhook
//!
//! One `tracing` subscriber is installed at startup from the logging section
//! of the configuration. `RUST_LOG`, when set, takes precedence over the
//! configured level so individual targets can be turned up while debugging.
//! A level given on the command line overrides both.
//!
//! Each deployment routine runs inside a [`deployment_span`], so every command
//! line it logs carries the deploy id and target environment.

use tracing::{info_span, Span};
use tracing_subscriber::{fmt::time::ChronoLocal, EnvFilter};

use crate::config::LoggingConfig;
use crate::types::{Environment, Result};

/// Create a deployment context span
pub fn deployment_span(deploy_id: &str, environment: Environment) -> Span {
    info_span!(
        "deployment",
        deploy_id = deploy_id,
        environment = environment.as_str()
    )
}

/// Log level values as strings for configuration
pub mod level {
    pub const TRACE: &str = "trace";
    pub const DEBUG: &str = "debug";
    pub const INFO: &str = "info";
    pub const WARN: &str = "warn";
    pub const ERROR: &str = "error";
}

/// Log format values as strings for configuration
pub mod format {
    pub const JSON: &str = "json";
    pub const PRETTY: &str = "pretty";
    pub const COMPACT: &str = "compact";

    pub const ALL: [&str; 3] = [JSON, PRETTY, COMPACT];
}

/// Build the filter used by the subscriber
///
/// `RUST_LOG` is only consulted when the level was not given explicitly.
fn build_filter(log_level: &str, explicit: bool) -> EnvFilter {
    if explicit {
        return EnvFilter::new(log_level);
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level))
}

/// Initialize logging
///
/// # Precedence
///
/// 1. CLI arguments (`log_level_override`, `log_format_override`)
/// 2. `RUST_LOG`, for the level only
/// 3. Configuration (file, then environment variables)
pub fn init(
    log_level_override: Option<&str>,
    log_format_override: Option<&str>,
    config: &LoggingConfig,
) -> Result<()> {
    let log_level = log_level_override.unwrap_or(&config.level);
    let log_format = log_format_override.unwrap_or(&config.format);

    let env_filter = build_filter(log_level, log_level_override.is_some());
    let timer = ChronoLocal::new("%Y-%m-%d %H:%M:%S%.3f".to_string());

    let result = match log_format {
        format::JSON => tracing_subscriber::fmt()
            .json()
            .with_timer(timer)
            .with_env_filter(env_filter)
            .with_target(false)
            .with_current_span(true)
            .with_span_list(false)
            .try_init(),
        format::COMPACT => tracing_subscriber::fmt()
            .compact()
            .with_timer(timer)
            .with_env_filter(env_filter)
            .with_target(false)
            .try_init(),
        _ => tracing_subscriber::fmt()
            .pretty()
            .with_timer(timer)
            .with_env_filter(env_filter)
            .with_target(false)
            .with_file(false)
            .with_line_number(false)
            .try_init(),
    };

    result.map_err(|e| crate::types::Error::Internal(format!("Failed to initialize logging: {}", e)))
}
