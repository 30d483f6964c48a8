//! Sink abstraction for dcs-feeder.
//!
//! The sink is the downstream variable server (MATRIC or compatible) that
//! receives batched upserts. Its transport and session lifecycle are owned
//! by the implementation; the synchronizer only needs a best-effort bulk set
//! and a way to tear the connection down.
//!
//! # Example
//!
//! ```ignore
//! let sink = MockSink::new();
//! sink.set_variables(&[VariableRecord::new("dcs_ALT", 1000)]).await?;
//! assert_eq!(sink.batches().len(), 1);
//! ```

mod mock;
mod stdout;

pub use mock::MockSink;
pub use stdout::StdoutSink;

use async_trait::async_trait;
use dcs_feeder_types::VariableRecord;
use thiserror::Error;

/// Sink errors.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The sink connection is not available.
    #[error("sink unavailable: {0}")]
    Unavailable(String),

    /// The bulk write failed.
    #[error("write failed: {0}")]
    WriteFailed(String),

    /// The sink has been stopped.
    #[error("sink stopped")]
    Stopped,

    /// Encoding the batch failed.
    #[error("encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Downstream variable server.
///
/// Implementations must be safe to call from the flush task and the command
/// relay concurrently.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Best-effort bulk upsert of variable records.
    ///
    /// No partial-failure reporting: either the call errors or the whole
    /// batch is considered handed over.
    async fn set_variables(&self, batch: &[VariableRecord]) -> Result<(), SinkError>;

    /// Tear down the sink connection.
    async fn stop(&self) -> Result<(), SinkError>;
}
