use std::net::SocketAddr;

use super::types::{Config, StackTarget};
use crate::logging;
use crate::types::{Environment, Result};

// Validation helper functions

/// Map a user supplied level onto a `tracing` level name.
/// Also accepts the `WARNING`, `CRITICAL` and `FATAL` aliases.
pub(crate) fn normalize_log_level(level: &str) -> Option<&'static str> {
    match level.trim().to_lowercase().as_str() {
        "trace" => Some(logging::level::TRACE),
        "debug" => Some(logging::level::DEBUG),
        "info" => Some(logging::level::INFO),
        "warn" | "warning" => Some(logging::level::WARN),
        "error" | "critical" | "fatal" => Some(logging::level::ERROR),
        _ => None,
    }
}

/// Validate listen address format (host:port)
pub(crate) fn validate_listen_address(addr: &str) -> Result<()> {
    addr.parse::<SocketAddr>()
        .map_err(|_| crate::types::Error::Validation {
            field: "server.bind".to_string(),
            message: format!(
                "Invalid listen address '{}'. Expected an IP address such as '0.0.0.0'",
                addr
            ),
        })?;
    Ok(())
}

/// Parse size strings like "1MB", "500KB", "2GB" into bytes
pub(crate) fn parse_size_string(size: &str) -> Result<usize> {
    let size = size.trim().to_uppercase();
    let invalid = || crate::types::Error::Validation {
        field: "server.max_request_size".to_string(),
        message: format!("Invalid size '{}'", size),
    };

    let (number, multiplier) = if let Some(n) = size.strip_suffix("KB") {
        (n, 1024)
    } else if let Some(n) = size.strip_suffix("MB") {
        (n, 1024 * 1024)
    } else if let Some(n) = size.strip_suffix("GB") {
        (n, 1024 * 1024 * 1024)
    } else if let Some(n) = size.strip_suffix('B') {
        (n, 1)
    } else {
        (size.as_str(), 1)
    };

    let number = number.trim().parse::<usize>().map_err(|_| invalid())?;
    if number == 0 {
        return Err(invalid());
    }
    number.checked_mul(multiplier).ok_or_else(invalid)
}

fn validate_non_empty(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(crate::types::Error::Validation {
            field: field.to_string(),
            message: "Value cannot be empty".to_string(),
        });
    }
    Ok(())
}

fn validate_stack_target(target: &StackTarget, environment: Environment) -> Result<()> {
    let prefix = format!("deploy.{}", environment);
    validate_non_empty(&target.stack, &format!("{}.stack", prefix))?;
    validate_non_empty(&target.compose_file, &format!("{}.compose_file", prefix))?;
    validate_non_empty(&target.backend_service, &format!("{}.backend_service", prefix))?;
    validate_non_empty(
        &target.frontend_service,
        &format!("{}.frontend_service", prefix),
    )?;
    Ok(())
}

impl Config {
    /// Validate the configuration before the server starts
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(crate::types::Error::Validation {
                field: "server.port".to_string(),
                message: "Port must be between 1 and 65535".to_string(),
            });
        }
        validate_listen_address(&self.listen_address())?;
        parse_size_string(&self.server.max_request_size)?;
        validate_non_empty(&self.server.service_name, "server.service_name")?;

        if self.auth.token.is_empty() {
            return Err(crate::types::Error::Validation {
                field: "auth.token".to_string(),
                message: "Webhook token cannot be empty".to_string(),
            });
        }

        if normalize_log_level(&self.logging.level).is_none() {
            return Err(crate::types::Error::Validation {
                field: "logging.level".to_string(),
                message: format!("Unknown log level '{}'", self.logging.level),
            });
        }
        if !logging::format::ALL.contains(&self.logging.format.as_str()) {
            return Err(crate::types::Error::Validation {
                field: "logging.format".to_string(),
                message: format!(
                    "Unknown log format '{}', expected one of {:?}",
                    self.logging.format,
                    logging::format::ALL
                ),
            });
        }

        validate_non_empty(&self.deploy.working_dir, "deploy.working_dir")?;
        validate_non_empty(&self.deploy.docker_bin, "deploy.docker_bin")?;
        if self.deploy.queue_capacity == 0 {
            return Err(crate::types::Error::Validation {
                field: "deploy.queue_capacity".to_string(),
                message: "Queue capacity must be at least 1".to_string(),
            });
        }
        for environment in Environment::ALL {
            validate_stack_target(self.deploy.target(environment), environment)?;
        }

        Ok(())
    }
}
