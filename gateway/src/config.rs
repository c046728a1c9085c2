//! Application configuration
//!
//! Loaded from a TOML file named on the command line; a handful of
//! fields can be overridden through `PUSH_SERVER_*` environment
//! variables.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use common_types::{RecipientConfig, SystemConfig};
use dispatcher::QueueSettings;
use push_storage::TaskSettings;
use serde::Deserialize;
use smtp_relay::RelayConfig;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub log: LogConfig,
    /// Recipient table keyed by alias
    #[serde(default)]
    pub recipients: HashMap<String, RecipientConfig>,
    #[serde(default)]
    pub queue: QueueSettings,
    #[serde(default)]
    pub task: TaskSettings,
    #[serde(default)]
    pub smtp_relay: RelayConfig,
    #[serde(default)]
    pub system: SystemConfig,
}

/// HTTP listen settings
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Deployment mode tag, surfaced in the startup log
    #[serde(default = "default_mode")]
    pub mode: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            mode: default_mode(),
        }
    }
}

/// Logger settings
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Tracing filter directive, e.g. `info` or `gateway=debug,info`
    #[serde(default = "default_level")]
    pub level: String,
    /// `text` or `json`
    #[serde(default = "default_format")]
    pub format: String,
    /// `stdout` or `file`
    #[serde(default = "default_output")]
    pub output: String,
    /// Log file location when `output` is `file`
    #[serde(default)]
    pub file_path: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: default_format(),
            output: default_output(),
            file_path: None,
        }
    }
}

impl AppConfig {
    /// Loads the configuration file and applies environment overrides
    ///
    /// # Errors
    ///
    /// Returns an error when the file is missing or fails to parse;
    /// startup treats that as fatal.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let mut config: Self = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// The HTTP listen address
    #[must_use]
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("PUSH_SERVER_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("PUSH_SERVER_SERVER_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
        if let Ok(level) = std::env::var("PUSH_SERVER_LOG_LEVEL") {
            self.log.level = level;
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    8080
}

fn default_mode() -> String {
    "release".to_string()
}

fn default_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

fn default_output() -> String {
    "stdout".to_string()
}
