//! Background flush task.
//!
//! Fires after the configured initial delay, then once per flush interval.
//! Each tick awaits its flush before the next tick can fire, so flushes from
//! the scheduler never overlap. Shutdown stops the timer; whatever is still
//! buffered is not drained.

use crate::sink::Sink;
use crate::synchronizer::Synchronizer;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Handle to a running flush task.
#[derive(Debug)]
pub struct FlushTaskHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl FlushTaskHandle {
    /// Stop accepting ticks and wait for the task to exit.
    ///
    /// A flush already in progress completes first.
    pub async fn shutdown(self) {
        // Receiver gone means the task already exited
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::error!("Flush task failed: {}", e);
        }
    }

    /// Check if the task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Spawn the periodic flush task for `sync`.
///
/// Returns a handle used to stop the task.
pub fn spawn_flush_task<S>(sync: Arc<Synchronizer<S>>) -> FlushTaskHandle
where
    S: Sink + 'static,
{
    let (shutdown, mut shutdown_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        let period = sync.config().flush_interval();
        let start = Instant::now() + sync.config().initial_delay();
        tracing::info!(
            "Flush task started (interval: {}ms, max batch: {})",
            period.as_millis(),
            sync.config().max_batch
        );

        let mut timer = interval_at(start, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => break,
                _ = timer.tick() => {
                    sync.flush().await;
                }
            }
        }

        tracing::info!(
            "Flush task stopped ({} records left unsent)",
            sync.pending_len()
        );
    });

    FlushTaskHandle { shutdown, task }
}
