//! Configuration loading for dcs-feeder.
//!
//! Configuration is loaded from a TOML file (default: `feeder.toml`).
//! Every section and field is optional; missing values take the defaults
//! below.

use dcs_feeder_core::FilterConfig;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::upstream::DEFAULT_IMPORT_ADDRESS;

/// Root configuration for dcs-feeder.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Synchronizer configuration.
    #[serde(default)]
    pub sync: SyncConfig,
    /// Command relay configuration.
    #[serde(default)]
    pub command: CommandConfig,
    /// Sink configuration.
    #[serde(default)]
    pub sink: SinkConfig,
    /// Upstream (command target) configuration.
    #[serde(default)]
    pub upstream: UpstreamConfig,
    /// Per-context allow-lists.
    #[serde(default)]
    pub filter: FilterConfig,
}

/// Synchronizer configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Maximum records per flush (default: 100).
    #[serde(default = "default_max_batch")]
    pub max_batch: usize,
    /// Flush period in milliseconds (default: 100).
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
    /// Delay before the first flush in milliseconds (default: 100).
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Ceiling applied to reported counts (default: 200).
    #[serde(default = "default_report_ceiling")]
    pub report_ceiling: usize,
    /// Prefix added to every key before it reaches the sink (default: `dcs_`).
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// Telemetry key whose value identifies the active context
    /// (default: `_ACFT_NAME`).
    #[serde(default = "default_context_key")]
    pub context_key: String,
    /// Call the sink even when nothing changed (default: true).
    #[serde(default = "default_send_empty_batches")]
    pub send_empty_batches: bool,
    /// Put a batch back into the buffer when the sink rejects it
    /// (default: false).
    #[serde(default)]
    pub requeue_failed_batches: bool,
}

/// Command relay configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandConfig {
    /// Sink-side name of the command variable (default: `dcs_command`).
    #[serde(default = "default_command_key")]
    pub key: String,
    /// Enable the command relay (default: true).
    #[serde(default = "default_command_enabled")]
    pub enabled: bool,
}

/// Sink configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SinkConfig {
    /// Application name announced to the sink (default: `DCS`).
    #[serde(default = "default_app_name")]
    pub app_name: String,
}

/// Upstream configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    /// Address commands are forwarded to (default: 127.0.0.1:7778).
    #[serde(default = "default_upstream_address")]
    pub address: String,
}

// Default value functions
fn default_max_batch() -> usize {
    100
}

fn default_flush_interval_ms() -> u64 {
    100
}

fn default_initial_delay_ms() -> u64 {
    100
}

fn default_report_ceiling() -> usize {
    200
}

fn default_key_prefix() -> String {
    "dcs_".to_string()
}

fn default_context_key() -> String {
    "_ACFT_NAME".to_string()
}

fn default_send_empty_batches() -> bool {
    true
}

fn default_command_key() -> String {
    "dcs_command".to_string()
}

fn default_command_enabled() -> bool {
    true
}

fn default_app_name() -> String {
    "DCS".to_string()
}

fn default_upstream_address() -> String {
    DEFAULT_IMPORT_ADDRESS.to_string()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_batch: default_max_batch(),
            flush_interval_ms: default_flush_interval_ms(),
            initial_delay_ms: default_initial_delay_ms(),
            report_ceiling: default_report_ceiling(),
            key_prefix: default_key_prefix(),
            context_key: default_context_key(),
            send_empty_batches: default_send_empty_batches(),
            requeue_failed_batches: false,
        }
    }
}

impl SyncConfig {
    /// Flush period.
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    /// Delay before the first flush.
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            key: default_command_key(),
            enabled: default_command_enabled(),
        }
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: default_upstream_address(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the synchronizer cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sync.max_batch == 0 {
            return Err(ConfigError::Invalid("sync.max_batch must be > 0".into()));
        }
        if self.sync.flush_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "sync.flush_interval_ms must be > 0".into(),
            ));
        }
        if self.sync.context_key.is_empty() {
            return Err(ConfigError::Invalid("sync.context_key must be set".into()));
        }
        if self.command.enabled && self.command.key.is_empty() {
            return Err(ConfigError::Invalid("command.key must be set".into()));
        }
        Ok(())
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
    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
