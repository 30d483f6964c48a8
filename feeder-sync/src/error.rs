//! Error types for dcs-feeder.

use dcs_feeder_types::RecordError;

use crate::config::ConfigError;
use crate::sink::SinkError;
use crate::upstream::UpstreamError;

/// Main error type for feeder operations.
#[derive(Debug, thiserror::Error)]
pub enum FeederError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Sink error.
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    /// Upstream error.
    #[error("upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    /// Rejected telemetry value.
    #[error("record error: {0}")]
    Record(#[from] RecordError),
}

/// Result type alias for feeder operations.
pub type Result<T> = std::result::Result<T, FeederError>;
