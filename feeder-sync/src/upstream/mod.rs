//! Upstream abstraction for dcs-feeder.
//!
//! The upstream is the telemetry source's command entry point. The only
//! operation needed is a fire-and-forget "send raw" of an opaque payload;
//! there is no acknowledgement.

mod mock;
mod udp;

pub use mock::MockUpstream;
pub use udp::{UdpUpstream, DEFAULT_IMPORT_ADDRESS};

use async_trait::async_trait;
use thiserror::Error;

/// Upstream errors.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Target address could not be parsed.
    #[error("invalid upstream address: {0}")]
    InvalidAddress(String),

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Command entry point of the telemetry source.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Forward an opaque command payload.
    async fn send_raw(&self, payload: &str) -> Result<(), UpstreamError>;
}
