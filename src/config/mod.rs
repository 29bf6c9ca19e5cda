//! Configuration for relaycore components.
//!
//! Supports YAML files and environment variable overrides.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::transport::Endpoint;

/// Default config file name (without extension), looked up in the cwd.
pub const DEFAULT_CONFIG_FILE: &str = "relaycore";

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "RELAYCORE_CONFIG";

/// Prefix for environment overrides, e.g. `RELAYCORE__LOGGER__TOPIC`.
pub const CONFIG_ENV_PREFIX: &str = "RELAYCORE";

pub const DEFAULT_LOGGER_ENDPOINT_PORT: u16 = 5556;
pub const DEFAULT_WORKER_ENDPOINT_PORT: u16 = 5557;
pub const DEFAULT_TOPIC: &str = "Project_Log";
pub const DEFAULT_LOG_FILE: &str = "/var/log/relaycore/project.log";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5000;

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),
}

/// Log aggregator settings. Publishers use `endpoint` and `topic` too.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Fan-out endpoint the aggregator binds.
    pub endpoint: Endpoint,
    pub topic: String,
    /// Active log file. Its directory must already exist.
    pub file: PathBuf,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::new("127.0.0.1", DEFAULT_LOGGER_ENDPOINT_PORT),
            topic: DEFAULT_TOPIC.to_string(),
            file: PathBuf::from(DEFAULT_LOG_FILE),
        }
    }
}

/// Worker service settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Rendezvous endpoint the worker binds.
    pub endpoint: Endpoint,
    /// Display name. Also determines the `TERMINATE_<NAME>` command.
    pub name: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::new("127.0.0.1", DEFAULT_WORKER_ENDPOINT_PORT),
            name: crate::services::HELLO_SERVICE_NAME.to_string(),
        }
    }
}

/// Gateway settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub worker_endpoint: Endpoint,
    /// Bound on one worker round trip, connection included.
    pub request_timeout_ms: u64,
}

impl GatewayConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            worker_endpoint: Endpoint::new("127.0.0.1", DEFAULT_WORKER_ENDPOINT_PORT),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logger: LoggerConfig,
    pub worker: WorkerConfig,
    pub gateway: GatewayConfig,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `relaycore.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `RELAYCORE_CONFIG` environment variable (if set)
    /// 4. Environment variables with `RELAYCORE` prefix and `__` separator
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }
}
