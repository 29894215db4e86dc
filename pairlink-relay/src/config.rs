//! Configuration loading for pairlink-relay.
//!
//! Configuration is loaded from a TOML file (default: `pairlink.toml`).
//! Every field has a default, and a missing file means full defaults.

use serde::Deserialize;
use std::path::PathBuf;

/// Root configuration for pairlink-relay.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Chat listener configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// HTTP operator interface configuration.
    #[serde(default)]
    pub http: HttpConfig,
    /// Durable storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Queue and buffer bounds.
    #[serde(default)]
    pub limits: LimitsConfig,
}

/// Chat listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the chat listener (default: 0.0.0.0:12345).
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

/// HTTP operator interface configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Bind address for the operator HTTP server (default: 127.0.0.1:8080).
    #[serde(default = "default_http_bind")]
    pub bind_address: String,
    /// Enable the Prometheus metrics endpoint (default: true).
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

/// Durable storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path of the registered-nickname file (default: registered.json).
    #[serde(default = "default_registered_path")]
    pub registered_path: PathBuf,
}

/// Queue and buffer bounds.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Maximum inbound line length in bytes (default: 64KiB). Longer lines
    /// are discarded as protocol errors.
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
    /// Depth of each connection's outbound queue (default: 64). A packet
    /// that finds the queue full is dropped.
    #[serde(default = "default_outbound_queue_depth")]
    pub outbound_queue_depth: usize,
    /// Capacity of the operator lifecycle-event buffer (default: 256).
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

// Default value functions
fn default_bind_address() -> String {
    format!("0.0.0.0:{}", pairlink_types::DEFAULT_PORT)
}

fn default_http_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_registered_path() -> PathBuf {
    PathBuf::from("registered.json")
}

fn default_max_line_bytes() -> usize {
    64 * 1024
}

fn default_outbound_queue_depth() -> usize {
    64
}

fn default_event_buffer() -> usize {
    256
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            http: HttpConfig::default(),
            storage: StorageConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_address: default_http_bind(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            registered_path: default_registered_path(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_line_bytes: default_max_line_bytes(),
            outbound_queue_depth: default_outbound_queue_depth(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.server.bind_address, "0.0.0.0:12345");
        assert_eq!(config.http.bind_address, "127.0.0.1:8080");
        assert_eq!(config.storage.registered_path, PathBuf::from("registered.json"));
        assert_eq!(config.limits.outbound_queue_depth, 64);
    }

    #[test]
    fn config_from_toml_string() {
        let toml = r#"
[server]
bind_address = "127.0.0.1:5000"

[http]
bind_address = "0.0.0.0:9090"
metrics_enabled = false

[storage]
registered_path = "/data/registered.json"

[limits]
outbound_queue_depth = 16
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.bind_address, "127.0.0.1:5000");
        assert_eq!(config.http.bind_address, "0.0.0.0:9090");
        assert!(!config.http.metrics_enabled);
        assert_eq!(
            config.storage.registered_path,
            PathBuf::from("/data/registered.json")
        );
        assert_eq!(config.limits.outbound_queue_depth, 16);
        // Untouched fields keep their defaults.
        assert_eq!(config.limits.max_line_bytes, 64 * 1024);
    }

    #[test]
    fn missing_sections_use_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.bind_address, "0.0.0.0:12345");
        assert_eq!(config.limits.event_buffer, 256);
    }

    #[test]
    fn from_file_reports_missing_file() {
        let err = Config::from_file(std::path::Path::new("/nonexistent/pairlink.toml"));
        assert!(matches!(err, Err(ConfigError::ReadError { .. })));
    }
}
