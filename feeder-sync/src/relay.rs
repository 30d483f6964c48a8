//! Command relay - the reverse channel from sink to telemetry source.
//!
//! A single user-editable variable on the sink acts as a command channel.
//! When a user writes a command into it, the relay forwards the payload to
//! the upstream and immediately writes an empty value back, so the variable
//! never holds a stale command.
//!
//! The reset itself shows up as another change notification. An empty
//! command value is ignored, which keeps that self-notification from
//! looping.

use dcs_feeder_types::{VariableRecord, VariablesChanged};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::metrics::SyncMetrics;
use crate::sink::{Sink, SinkError};
use crate::upstream::Upstream;

/// What the relay did with a change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Command key absent from the notification, or already empty.
    Ignored,
    /// Payload forwarded and the key reset.
    Forwarded,
    /// Forward failed; the key was reset anyway.
    ForwardFailed,
}

/// Forwards writes of the command variable upstream.
pub struct CommandRelay<S: Sink, U: Upstream> {
    key: String,
    sink: Arc<S>,
    upstream: Arc<U>,
    metrics: Arc<SyncMetrics>,
}

impl<S: Sink, U: Upstream> std::fmt::Debug for CommandRelay<S, U> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRelay")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl<S: Sink, U: Upstream> CommandRelay<S, U> {
    /// Create a relay for the command variable `key`.
    pub fn new(key: &str, sink: Arc<S>, upstream: Arc<U>, metrics: Arc<SyncMetrics>) -> Self {
        Self {
            key: key.to_string(),
            sink,
            upstream,
            metrics,
        }
    }

    /// Name of the command variable.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Publish the empty command variable so the sink exposes it as editable.
    pub async fn announce(&self) -> Result<(), SinkError> {
        self.reset().await?;
        tracing::info!("Command variable {:?} announced", self.key);
        Ok(())
    }

    /// Handle a sink change notification.
    ///
    /// # Errors
    ///
    /// Returns an error only if the corrective reset could not be written.
    /// Forward failures are logged and reported as
    /// [`RelayOutcome::ForwardFailed`].
    pub async fn on_variables_changed(
        &self,
        event: &VariablesChanged,
    ) -> Result<RelayOutcome, SinkError> {
        let Some(record) = event.changed_record(&self.key) else {
            return Ok(RelayOutcome::Ignored);
        };

        let payload = record.value.to_string();
        if payload.is_empty() {
            return Ok(RelayOutcome::Ignored);
        }

        let outcome = match self.upstream.send_raw(&payload).await {
            Ok(()) => {
                SyncMetrics::incr(&self.metrics.commands_forwarded_total);
                tracing::debug!("Forwarded command {:?}", payload);
                RelayOutcome::Forwarded
            }
            Err(e) => {
                SyncMetrics::incr(&self.metrics.command_failures_total);
                tracing::warn!("Command forward failed: {}", e);
                RelayOutcome::ForwardFailed
            }
        };

        self.reset().await?;
        Ok(outcome)
    }

    async fn reset(&self) -> Result<(), SinkError> {
        self.sink
            .set_variables(&[VariableRecord::command(&self.key, "")])
            .await
    }
}

/// Spawn a task feeding sink notifications from `events` into `relay`.
///
/// The task exits when every sender has been dropped.
pub fn spawn_relay_task<S, U>(
    relay: Arc<CommandRelay<S, U>>,
    mut events: mpsc::Receiver<VariablesChanged>,
) -> JoinHandle<()>
where
    S: Sink + 'static,
    U: Upstream + 'static,
{
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if let Err(e) = relay.on_variables_changed(&event).await {
                tracing::warn!("Command reset failed: {}", e);
            }
        }
        tracing::debug!("Command relay stopped");
    })
}
