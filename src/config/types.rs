use serde::{Deserialize, Serialize};
use std::path::Path;

use super::secret::SecretToken;
use crate::types::{ConfigError, Environment, Result};

/// Placeholder token used when nothing is configured. Startup warns about it.
pub const PLACEHOLDER_TOKEN: &str = "your-secret-webhook-token";

/// Environment variables read on top of the file configuration
pub mod env {
    pub const PORT: &str = "WEBHOOK_PORT";
    pub const BIND: &str = "WEBHOOK_BIND";
    pub const TOKEN: &str = "WEBHOOK_TOKEN";
    pub const LOG_LEVEL: &str = "LOG_LEVEL";
    pub const LOG_FORMAT: &str = "LOG_FORMAT";
    pub const WORKDIR: &str = "DEPLOY_WORKDIR";
    pub const DOCKER_BIN: &str = "DOCKER_BIN";
}

/// Process configuration, loaded once at startup and passed to each component
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub deploy: DeployConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_request_size")]
    pub max_request_size: String,
    /// Name reported by the health endpoint
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_token")]
    pub token: SecretToken,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Directory the orchestration CLI runs in; compose files are resolved from here
    #[serde(default = "default_working_dir")]
    pub working_dir: String,
    #[serde(default = "default_docker_bin")]
    pub docker_bin: String,
    /// Pending deployments allowed per environment before requests are refused
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Per-command timeout in seconds, 0 disables it
    #[serde(default)]
    pub command_timeout: u64,
    #[serde(default = "default_production_target")]
    pub production: StackTarget,
    #[serde(default = "default_staging_target")]
    pub staging: StackTarget,
}

/// Swarm stack and services touched by a deployment to one environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackTarget {
    pub stack: String,
    pub compose_file: String,
    pub backend_service: String,
    pub frontend_service: String,
    #[serde(default)]
    pub prune_images: bool,
}

impl StackTarget {
    /// Conventional target for a stack: services are named `<stack>_backend`
    /// and `<stack>_frontend`
    pub fn for_stack(stack: &str, compose_file: &str, prune_images: bool) -> Self {
        Self {
            stack: stack.to_string(),
            compose_file: compose_file.to_string(),
            backend_service: format!("{}_backend", stack),
            frontend_service: format!("{}_frontend", stack),
            prune_images,
        }
    }
}

impl DeployConfig {
    pub fn target(&self, environment: Environment) -> &StackTarget {
        match environment {
            Environment::Production => &self.production,
            Environment::Staging => &self.staging,
        }
    }
}

impl Config {
    /// Load configuration from an optional TOML file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };
        config.with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Load configuration from file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let content = std::fs::read_to_string(&path)
            .map_err(|_| ConfigError::FileNotFound { path: path_str })?;

        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// Apply environment variable overrides using the given lookup
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(port) = lookup(env::PORT) {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidEnv {
                    variable: env::PORT.to_string(),
                    value: port.clone(),
                })?;
        }
        if let Some(bind) = lookup(env::BIND) {
            self.server.bind = bind.trim().to_string();
        }
        if let Some(token) = lookup(env::TOKEN) {
            self.auth.token = SecretToken::new(token);
        }
        if let Some(level) = lookup(env::LOG_LEVEL) {
            self.logging.level = level;
        }
        if let Some(format) = lookup(env::LOG_FORMAT) {
            self.logging.format = format;
        }
        if let Some(dir) = lookup(env::WORKDIR) {
            self.deploy.working_dir = dir;
        }
        if let Some(bin) = lookup(env::DOCKER_BIN) {
            self.deploy.docker_bin = bin;
        }

        self.logging.level = super::validators::normalize_log_level(&self.logging.level)
            .ok_or_else(|| ConfigError::InvalidEnv {
                variable: env::LOG_LEVEL.to_string(),
                value: self.logging.level.clone(),
            })?
            .to_string();
        self.logging.format = self.logging.format.trim().to_lowercase();

        Ok(self)
    }

    /// Socket address string the server binds to
    pub fn listen_address(&self) -> String {
        if self.server.bind.contains(':') && !self.server.bind.starts_with('[') {
            // Bare IPv6 literal
            format!("[{}]:{}", self.server.bind, self.server.port)
        } else {
            format!("{}:{}", self.server.bind, self.server.port)
        }
    }

    /// Whether the token is still the shipped placeholder
    pub fn uses_placeholder_token(&self) -> bool {
        self.auth.token.expose() == PLACEHOLDER_TOKEN
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            max_request_size: default_max_request_size(),
            service_name: default_service_name(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token: default_token(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            working_dir: default_working_dir(),
            docker_bin: default_docker_bin(),
            queue_capacity: default_queue_capacity(),
            command_timeout: 0,
            production: default_production_target(),
            staging: default_staging_target(),
        }
    }
}

// Default value functions

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9000
}

fn default_max_request_size() -> String {
    "1MB".to_string()
}

fn default_service_name() -> String {
    "volt-deployment-webhook".to_string()
}

fn default_token() -> SecretToken {
    SecretToken::new(PLACEHOLDER_TOKEN.to_string())
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_working_dir() -> String {
    "/opt/volt".to_string()
}

fn default_docker_bin() -> String {
    "docker".to_string()
}

fn default_queue_capacity() -> usize {
    16
}

fn default_production_target() -> StackTarget {
    StackTarget::for_stack("volt-prod", "docker-compose.prod.yml", true)
}

fn default_staging_target() -> StackTarget {
    StackTarget::for_stack("volt-staging", "docker-compose.staging.yml", false)
}
