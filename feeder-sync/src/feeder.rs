//! Feeder - wires the synchronizer, flush task and command relay together.
//!
//! ```text
//! telemetry ──► Feeder::ingest ──► Synchronizer ──(flush task)──► Sink
//!                                                                   │
//! upstream ◄── CommandRelay ◄── Feeder::notifier ◄── sink changes ──┘
//! ```

use dcs_feeder_types::{RecordError, Value, VariablesChanged};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::error::Result;
use crate::metrics::SyncMetrics;
use crate::relay::{spawn_relay_task, CommandRelay};
use crate::scheduler::{spawn_flush_task, FlushTaskHandle};
use crate::sink::Sink;
use crate::synchronizer::{Ingest, Synchronizer};
use crate::upstream::Upstream;

/// Capacity of the sink notification queue feeding the command relay.
const RELAY_QUEUE: usize = 32;

/// A running feeder.
pub struct Feeder<S: Sink> {
    sync: Arc<Synchronizer<S>>,
    flush_task: FlushTaskHandle,
    relay_task: Option<JoinHandle<()>>,
    notifier: Option<mpsc::Sender<VariablesChanged>>,
}

impl<S: Sink> std::fmt::Debug for Feeder<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Feeder")
            .field("sync", &self.sync)
            .field("relay_enabled", &self.notifier.is_some())
            .finish_non_exhaustive()
    }
}

impl<S: Sink + 'static> Feeder<S> {
    /// Validate `config` and start the flush task and, if enabled, the
    /// command relay.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub async fn start<U>(config: Config, sink: Arc<S>, upstream: Arc<U>) -> Result<Self>
    where
        U: Upstream + 'static,
    {
        config.validate()?;

        let metrics = Arc::new(SyncMetrics::default());
        let sync = Arc::new(Synchronizer::with_metrics(
            config.sync.clone(),
            config.filter.clone(),
            Arc::clone(&sink),
            Arc::clone(&metrics),
        ));

        let (relay_task, notifier) = if config.command.enabled {
            let relay = CommandRelay::new(&config.command.key, sink, upstream, metrics);
            if let Err(e) = relay.announce().await {
                tracing::warn!("Could not announce command variable: {}", e);
            }
            let (tx, rx) = mpsc::channel(RELAY_QUEUE);
            (Some(spawn_relay_task(Arc::new(relay), rx)), Some(tx))
        } else {
            tracing::info!("Command relay disabled");
            (None, None)
        };

        let flush_task = spawn_flush_task(Arc::clone(&sync));

        Ok(Self {
            sync,
            flush_task,
            relay_task,
            notifier,
        })
    }
}

impl<S: Sink> Feeder<S> {
    /// The underlying synchronizer.
    pub fn synchronizer(&self) -> &Arc<Synchronizer<S>> {
        &self.sync
    }

    /// Ingest one telemetry update.
    pub fn ingest(&self, key: &str, value: impl Into<Value>) -> std::result::Result<Ingest, RecordError> {
        self.sync.ingest(key, value)
    }

    /// Sender for sink change notifications (None if the relay is disabled).
    pub fn notifier(&self) -> Option<mpsc::Sender<VariablesChanged>> {
        self.notifier.clone()
    }

    /// Stop the flush task and the relay, then stop the sink.
    ///
    /// Buffered records are not drained.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink fails to stop.
    pub async fn shutdown(self) -> Result<()> {
        self.flush_task.shutdown().await;

        // Relay task exits once every notifier clone is gone
        drop(self.notifier);
        if let Some(task) = self.relay_task {
            if let Err(e) = task.await {
                tracing::error!("Command relay task failed: {}", e);
            }
        }

        self.sync.sink().stop().await?;
        tracing::debug!("Final metrics:\n{}", self.sync.metrics().render_prometheus());
        Ok(())
    }
}
