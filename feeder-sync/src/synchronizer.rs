//! Synchronizer - the change-buffered bridge between telemetry and sink.
//!
//! # Architecture
//!
//! ```text
//! telemetry → ingest() → context gate → allow-list → dedup → change buffer
//!                                                                 │
//!                                  flush task (fixed period) ◄────┘
//!                                        │
//!                                        ▼
//!                             Sink::set_variables(batch ≤ max_batch)
//! ```
//!
//! # Locking
//!
//! The dedup store and the change buffer share one `std::sync::Mutex`. It is
//! held only across the compare-and-mutate section of `ingest()` and the
//! batch extraction of `flush()`, never across a call to the sink. A
//! separate async gate serializes whole flushes so two flushes never
//! interleave against the same buffer.

use dcs_feeder_core::{
    ActiveContext, Admission, ChangeBuffer, ContextFilter, ContextUpdate, DedupStore,
    FilterConfig,
};
use dcs_feeder_types::{FlushNotification, RecordError, Value, VariableRecord};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;

use crate::config::SyncConfig;
use crate::metrics::SyncMetrics;
use crate::sink::Sink;

/// Capacity of the flush notification channel.
const NOTIFICATION_CAPACITY: usize = 64;

/// Result of a single `ingest()` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingest {
    /// The value changed and is staged for the next flush.
    Buffered,
    /// Same value as last accepted; nothing staged.
    Unchanged,
    /// Dropped: no context has been reported yet.
    NoContext,
    /// Dropped: key not in the current allow-list.
    Filtered,
}

/// What happened to the batch taken by a flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// The sink accepted the batch.
    Delivered,
    /// Nothing was pending and empty batches are disabled.
    SkippedEmpty,
    /// The sink rejected the batch.
    Failed {
        /// Records put back into the buffer (0 unless requeue is enabled).
        requeued: usize,
    },
}

/// Summary of one flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushReport {
    /// Buffer depth observed before anything was taken.
    pub depth: usize,
    /// Records delivered to the sink.
    pub sent: usize,
    /// Records left in the buffer afterwards.
    pub remaining: usize,
    /// Delivery outcome.
    pub outcome: FlushOutcome,
}

/// State guarded by the buffer lock.
#[derive(Debug, Default)]
struct BufferState {
    dedup: DedupStore,
    buffer: ChangeBuffer,
}

/// Change-buffered synchronizer.
///
/// `ingest()` is synchronous and may be called from the telemetry reader
/// thread; `flush()` is driven by the flush task (see
/// [`crate::scheduler::spawn_flush_task`]).
pub struct Synchronizer<S: Sink> {
    config: SyncConfig,
    filter: ContextFilter,
    context: Mutex<ActiveContext>,
    state: Mutex<BufferState>,
    flush_gate: tokio::sync::Mutex<()>,
    sink: Arc<S>,
    metrics: Arc<SyncMetrics>,
    notifications: broadcast::Sender<FlushNotification>,
}

impl<S: Sink> std::fmt::Debug for Synchronizer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synchronizer")
            .field("config", &self.config)
            .field("pending", &self.pending_len())
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<S: Sink> Synchronizer<S> {
    /// Create a synchronizer writing to `sink`.
    pub fn new(config: SyncConfig, filter: FilterConfig, sink: Arc<S>) -> Self {
        Self::with_metrics(config, filter, sink, Arc::new(SyncMetrics::default()))
    }

    /// Create a synchronizer sharing an existing metrics instance.
    pub fn with_metrics(
        config: SyncConfig,
        filter: FilterConfig,
        sink: Arc<S>,
        metrics: Arc<SyncMetrics>,
    ) -> Self {
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        Self {
            config,
            filter: ContextFilter::new(filter),
            context: Mutex::new(ActiveContext::new()),
            state: Mutex::new(BufferState::default()),
            flush_gate: tokio::sync::Mutex::new(()),
            sink,
            metrics,
            notifications,
        }
    }

    /// Synchronizer configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Operational metrics.
    pub fn metrics(&self) -> &Arc<SyncMetrics> {
        &self.metrics
    }

    /// The sink batches are delivered to.
    pub fn sink(&self) -> &Arc<S> {
        &self.sink
    }

    /// Subscribe to buffer-depth and sent-count notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<FlushNotification> {
        self.notifications.subscribe()
    }

    /// Sink-facing name of a telemetry key.
    pub fn sink_key(&self, key: &str) -> String {
        format!("{}{}", self.config.key_prefix, key)
    }

    /// Ingest one telemetry update.
    ///
    /// An update for the configured context key switches the active context
    /// (and its allow-list) before the update itself is considered.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::KindMismatch`] if `key` was first observed with
    /// a different value kind. Nothing is mutated in that case.
    pub fn ingest(&self, key: &str, value: impl Into<Value>) -> Result<Ingest, RecordError> {
        let value = value.into();
        SyncMetrics::incr(&self.metrics.ingested_total);

        let admission = {
            let mut context = lock(&self.context);
            if key == self.config.context_key {
                self.observe_context(&mut context, &value);
            }
            context.admits(key)
        };

        match admission {
            Admission::NoContext => {
                SyncMetrics::incr(&self.metrics.gated_total);
                tracing::trace!("Dropped {}: no context yet", key);
                return Ok(Ingest::NoContext);
            }
            Admission::Filtered => {
                SyncMetrics::incr(&self.metrics.filtered_total);
                tracing::trace!("Dropped {}: not in allow-list", key);
                return Ok(Ingest::Filtered);
            }
            Admission::Admitted => {}
        }

        let name = self.sink_key(key);
        let mut state = lock(&self.state);

        let observation = state.dedup.observe(&name, &value).inspect_err(|e| {
            SyncMetrics::incr(&self.metrics.rejected_total);
            tracing::debug!("Rejected {}: {}", name, e);
        })?;
        if !observation.is_change() {
            SyncMetrics::incr(&self.metrics.unchanged_total);
            tracing::trace!("Unchanged {}", name);
            return Ok(Ingest::Unchanged);
        }

        state.buffer.upsert(&name, value.clone())?;
        tracing::trace!("Buffered {} = {}", name, value);
        state.dedup.accept(&name, value);
        SyncMetrics::incr(&self.metrics.buffered_total);
        Ok(Ingest::Buffered)
    }

    /// Ingest an update given as an untyped text token.
    ///
    /// The kind is decided once per key: a key first seen as text keeps
    /// receiving the token verbatim, a key first seen as a number has the
    /// token parsed as one, and a new key goes through [`Value::infer`].
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::KindMismatch`] if a numeric key receives a
    /// token that is not a number.
    pub fn ingest_raw(&self, key: &str, raw: &str) -> Result<Ingest, RecordError> {
        let value = match self.last_value(&self.sink_key(key)) {
            Some(Value::Text(_)) => Value::Text(raw.to_string()),
            Some(Value::Number(_)) => match Value::parse_number(raw) {
                Some(n) => Value::Number(n),
                None => Value::Text(raw.to_string()),
            },
            None => Value::infer(raw),
        };
        self.ingest(key, value)
    }

    /// Ingest an update carried as a dynamic JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::UnsupportedValueType`] for anything that is not
    /// a string or a number, before any state is touched.
    pub fn ingest_json(&self, key: &str, value: serde_json::Value) -> Result<Ingest, RecordError> {
        let value = Value::try_from(value).inspect_err(|_| {
            SyncMetrics::incr(&self.metrics.ingested_total);
            SyncMetrics::incr(&self.metrics.rejected_total);
        })?;
        self.ingest(key, value)
    }

    fn observe_context(&self, context: &mut ActiveContext, value: &Value) {
        let reported = value.to_string();
        if let ContextUpdate::Switched {
            from,
            to,
            resolved,
            allowed,
        } = context.observe(&reported, &self.filter)
        {
            SyncMetrics::incr(&self.metrics.context_switches_total);
            if allowed == 0 {
                tracing::info!(
                    "Context switched: {:?} -> {:?} (resolved {:?}, unfiltered)",
                    from,
                    to,
                    resolved
                );
            } else {
                tracing::info!(
                    "Context switched: {:?} -> {:?} (resolved {:?}, {} keys allowed)",
                    from,
                    to,
                    resolved,
                    allowed
                );
            }
        }
    }

    /// Flush up to `max_batch` pending records to the sink.
    ///
    /// Concurrent calls are serialized. Records taken from the buffer are
    /// not restored if the sink fails, unless `requeue_failed_batches` is
    /// enabled.
    pub async fn flush(&self) -> FlushReport {
        let _gate = self.flush_gate.lock().await;

        let (depth, batch) = {
            let mut state = lock(&self.state);
            let depth = state.buffer.len();
            (depth, state.buffer.take_batch(self.config.max_batch))
        };

        if batch.is_empty() && !self.config.send_empty_batches {
            self.publish(depth, 0);
            return FlushReport {
                depth,
                sent: 0,
                remaining: 0,
                outcome: FlushOutcome::SkippedEmpty,
            };
        }

        SyncMetrics::incr(&self.metrics.flushes_total);
        let count = batch.len();
        let (sent, outcome) = match self.sink.set_variables(&batch).await {
            Ok(()) => {
                self.metrics
                    .records_sent_total
                    .fetch_add(count as u64, std::sync::atomic::Ordering::Relaxed);
                (count, FlushOutcome::Delivered)
            }
            Err(e) => {
                SyncMetrics::incr(&self.metrics.sink_failures_total);
                let requeued = self.handle_failed_batch(batch);
                tracing::warn!(
                    "Flush of {} records failed: {} ({} requeued)",
                    count,
                    e,
                    requeued
                );
                (0, FlushOutcome::Failed { requeued })
            }
        };

        let remaining = lock(&self.state).buffer.len();
        if count > 0 {
            tracing::debug!(
                "Flushed {} of {} pending records ({} remaining)",
                sent,
                depth,
                remaining
            );
        }
        self.publish(depth, sent);

        FlushReport {
            depth,
            sent,
            remaining,
            outcome,
        }
    }

    fn handle_failed_batch(&self, batch: Vec<VariableRecord>) -> usize {
        if !self.config.requeue_failed_batches {
            return 0;
        }
        lock(&self.state).buffer.requeue(batch)
    }

    /// Emit the flush notifications without blocking the flush path.
    fn publish(&self, depth: usize, sent: usize) {
        let ceiling = self.config.report_ceiling;
        let tx = self.notifications.clone();
        tokio::spawn(async move {
            // No subscribers is fine
            let _ = tx.send(FlushNotification::BufferDepth(depth.min(ceiling)));
            let _ = tx.send(FlushNotification::Sent(sent.min(ceiling)));
        });
    }

    /// Number of records waiting for the next flush.
    pub fn pending_len(&self) -> usize {
        lock(&self.state).buffer.len()
    }

    /// The pending record for a sink-facing name.
    pub fn pending(&self, name: &str) -> Option<VariableRecord> {
        lock(&self.state).buffer.get(name).cloned()
    }

    /// Last accepted value for a sink-facing name.
    pub fn last_value(&self, name: &str) -> Option<Value> {
        lock(&self.state).dedup.get(name).cloned()
    }

    /// The currently reported context.
    pub fn current_context(&self) -> Option<String> {
        lock(&self.context).current().map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{MockSink, SinkError};
    use dcs_feeder_types::VariableKind;

    fn sync_with(config: SyncConfig, filter: FilterConfig) -> (Synchronizer<MockSink>, MockSink) {
        let sink = MockSink::new();
        let sync = Synchronizer::new(config, filter, Arc::new(sink.clone()));
        (sync, sink)
    }

    /// Synchronizer with the default config and an unfiltered context already set.
    fn open_sync() -> (Synchronizer<MockSink>, MockSink) {
        let (sync, sink) = sync_with(SyncConfig::default(), FilterConfig::default());
        sync.ingest("_ACFT_NAME", "Ka-50").unwrap();
        // Drop the buffered context update so tests start clean
        lock(&sync.state).buffer.clear();
        (sync, sink)
    }

    // ===========================================
    // Ingestion
    // ===========================================

    #[tokio::test]
    async fn scenario_dedup_and_flush() {
        let (sync, sink) = open_sync();

        assert_eq!(sync.ingest("ALT", 1000).unwrap(), Ingest::Buffered);
        assert_eq!(sync.ingest("ALT", 1000).unwrap(), Ingest::Unchanged);
        assert_eq!(sync.pending_len(), 1);

        let report = sync.flush().await;
        assert_eq!(report.sent, 1);
        assert_eq!(report.outcome, FlushOutcome::Delivered);

        let batch = sink.last_batch().unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].name, "dcs_ALT");
        assert_eq!(batch[0].value, Value::Number(1000.0));
        assert_eq!(batch[0].kind, VariableKind::Number);
        assert_eq!(sync.pending_len(), 0);
    }

    #[tokio::test]
    async fn repeated_value_after_flush_is_not_resent() {
        let (sync, sink) = open_sync();

        sync.ingest("ALT", 1000).unwrap();
        sync.flush().await;
        assert_eq!(sync.ingest("ALT", 1000).unwrap(), Ingest::Unchanged);

        sync.flush().await;
        // Second flush is an empty heartbeat
        assert_eq!(sink.batches().len(), 2);
        assert!(sink.last_batch().unwrap().is_empty());
    }

    #[test]
    fn last_write_wins_within_interval() {
        let (sync, _sink) = open_sync();

        sync.ingest("ALT", 1000).unwrap();
        sync.ingest("ALT", 1100).unwrap();
        sync.ingest("ALT", 1200).unwrap();

        assert_eq!(sync.pending_len(), 1);
        assert_eq!(
            sync.pending("dcs_ALT").unwrap().value,
            Value::Number(1200.0)
        );
    }

    #[test]
    fn kind_mismatch_is_rejected_without_mutation() {
        let (sync, _sink) = open_sync();
        sync.ingest("ALT", 1000).unwrap();

        let err = sync.ingest("ALT", "high").unwrap_err();
        assert!(matches!(err, RecordError::KindMismatch { .. }));
        assert_eq!(sync.last_value("dcs_ALT"), Some(Value::Number(1000.0)));
        assert_eq!(
            sync.metrics()
                .rejected_total
                .load(std::sync::atomic::Ordering::Relaxed),
            1
        );
    }

    #[test]
    fn unsupported_json_value_fails_fast() {
        let (sync, _sink) = open_sync();

        let err = sync.ingest_json("ALT", serde_json::json!(true)).unwrap_err();
        assert_eq!(err, RecordError::UnsupportedValueType { found: "bool" });
        assert_eq!(sync.pending_len(), 0);

        assert_eq!(
            sync.ingest_json("ALT", serde_json::json!(1000)).unwrap(),
            Ingest::Buffered
        );
    }

    #[test]
    fn sink_key_uses_prefix() {
        let config = SyncConfig {
            key_prefix: "bios_".to_string(),
            ..SyncConfig::default()
        };
        let (sync, _sink) = sync_with(config, FilterConfig::default());
        assert_eq!(sync.sink_key("ALT"), "bios_ALT");
    }

    #[test]
    fn raw_tokens_keep_the_kind_of_first_observation() {
        let (sync, _sink) = open_sync();

        // Numeric-looking string output stays text, and so do later values
        assert_eq!(sync.ingest_raw("UHF_FREQ", "251.000").unwrap(), Ingest::Buffered);
        assert_eq!(
            sync.pending("dcs_UHF_FREQ").unwrap().value,
            Value::Text("251.000".into())
        );
        assert_eq!(sync.ingest_raw("UHF_FREQ", "GUARD").unwrap(), Ingest::Buffered);
        assert_eq!(sync.ingest_raw("UHF_FREQ", "243").unwrap(), Ingest::Buffered);
        assert_eq!(
            sync.pending("dcs_UHF_FREQ").unwrap().value,
            Value::Text("243".into())
        );
    }

    #[test]
    fn raw_tokens_for_numeric_keys_parse_any_spelling() {
        let (sync, _sink) = open_sync();

        sync.ingest_raw("RPM", "80").unwrap();
        assert_eq!(sync.pending("dcs_RPM").unwrap().kind, VariableKind::Number);

        assert_eq!(sync.ingest_raw("RPM", "80.50").unwrap(), Ingest::Buffered);
        assert_eq!(sync.last_value("dcs_RPM"), Some(Value::Number(80.5)));
        assert_eq!(sync.ingest_raw("RPM", "80.5").unwrap(), Ingest::Unchanged);

        let err = sync.ingest_raw("RPM", "OFF").unwrap_err();
        assert!(matches!(err, RecordError::KindMismatch { .. }));
    }

    /// Log writer collecting everything into a shared buffer.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn every_ingest_decision_is_logged() {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer(logs.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let (sync, _sink) = sync_with(
                SyncConfig::default(),
                FilterConfig::default().with_context("F-16", ["ALT"]),
            );
            sync.ingest("ALT", 1000).unwrap();
            sync.ingest("_ACFT_NAME", "F-16").unwrap();
            sync.ingest("ALT", 1000).unwrap();
            sync.ingest("ALT", 1000).unwrap();
            sync.ingest("ALT", "high").unwrap_err();
        });

        let text = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(text.contains("Dropped ALT: no context yet"));
        assert!(text.contains("Dropped _ACFT_NAME: not in allow-list"));
        assert!(text.contains("Buffered dcs_ALT = 1000"));
        assert!(text.contains("Unchanged dcs_ALT"));
        assert!(text.contains("Rejected dcs_ALT: kind mismatch"));
    }

    // ===========================================
    // Context gating
    // ===========================================

    #[tokio::test]
    async fn updates_before_context_are_never_flushed() {
        let (sync, sink) = sync_with(SyncConfig::default(), FilterConfig::default());

        assert_eq!(sync.ingest("ALT", 1000).unwrap(), Ingest::NoContext);
        assert!(sync.current_context().is_none());

        sync.ingest("_ACFT_NAME", "Ka-50").unwrap();
        sync.flush().await;

        let names: Vec<String> = sink
            .last_batch()
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["dcs__ACFT_NAME".to_string()]);
    }

    #[test]
    fn scenario_context_allow_list() {
        let filter = FilterConfig::default().with_context("F-16", ["RPM"]);
        let (sync, _sink) = sync_with(SyncConfig::default(), filter);

        // The context key itself is not in the allow-list
        assert_eq!(sync.ingest("_ACFT_NAME", "F-16").unwrap(), Ingest::Filtered);
        assert_eq!(sync.current_context().as_deref(), Some("F-16"));

        assert_eq!(sync.ingest("RPM", 80).unwrap(), Ingest::Buffered);
        assert_eq!(sync.ingest("FUEL", 50).unwrap(), Ingest::Filtered);
        assert!(sync.pending("dcs_RPM").is_some());
        assert!(sync.pending("dcs_FUEL").is_none());
    }

    #[test]
    fn context_switch_revokes_previous_allow_list() {
        let filter = FilterConfig::default()
            .with_context("F-16", ["RPM"])
            .with_context("A-10C", ["FUEL"]);
        let (sync, _sink) = sync_with(SyncConfig::default(), filter);

        sync.ingest("_ACFT_NAME", "F-16").unwrap();
        assert_eq!(sync.ingest("RPM", 80).unwrap(), Ingest::Buffered);

        sync.ingest("_ACFT_NAME", "A-10C").unwrap();
        assert_eq!(sync.ingest("RPM", 81).unwrap(), Ingest::Filtered);
        assert_eq!(sync.ingest("FUEL", 50).unwrap(), Ingest::Buffered);
    }

    #[test]
    fn alias_selects_configured_allow_list() {
        let filter = FilterConfig::default()
            .with_context("F-16", ["RPM"])
            .with_alias("F-16C_50", "F-16");
        let (sync, _sink) = sync_with(SyncConfig::default(), filter);

        sync.ingest("_ACFT_NAME", "F-16C_50").unwrap();
        assert_eq!(sync.ingest("RPM", 80).unwrap(), Ingest::Buffered);
        assert_eq!(sync.ingest("FUEL", 50).unwrap(), Ingest::Filtered);
    }

    #[test]
    fn metadata_groups_admit_context_key() {
        let mut filter = FilterConfig::default().with_context("F-16", ["RPM"]);
        filter.metadata_start = vec!["_ACFT_NAME".to_string()];
        let (sync, _sink) = sync_with(SyncConfig::default(), filter);

        assert_eq!(sync.ingest("_ACFT_NAME", "F-16").unwrap(), Ingest::Buffered);
        assert_eq!(
            sync.pending("dcs__ACFT_NAME").unwrap().value,
            Value::Text("F-16".to_string())
        );
    }

    // ===========================================
    // Flush
    // ===========================================

    #[tokio::test]
    async fn batch_cap_leaves_remainder_buffered() {
        let (sync, sink) = open_sync();
        for i in 0..250u32 {
            sync.ingest(&format!("K{:03}", i), i).unwrap();
        }

        let report = sync.flush().await;
        assert_eq!(report.depth, 250);
        assert_eq!(report.sent, 100);
        assert_eq!(report.remaining, 150);
        assert_eq!(sink.last_batch().unwrap().len(), 100);

        sync.flush().await;
        let report = sync.flush().await;
        assert_eq!(report.sent, 50);
        assert_eq!(report.remaining, 0);
    }

    #[tokio::test]
    async fn flush_empties_buffer_and_keeps_dedup() {
        let (sync, _sink) = open_sync();
        sync.ingest("ALT", 1000).unwrap();
        sync.ingest("RPM", 80).unwrap();

        let report = sync.flush().await;
        assert_eq!(report.remaining, 0);
        assert_eq!(sync.pending_len(), 0);
        assert_eq!(sync.last_value("dcs_ALT"), Some(Value::Number(1000.0)));
        assert_eq!(sync.last_value("dcs_RPM"), Some(Value::Number(80.0)));
    }

    #[tokio::test]
    async fn empty_flush_can_be_suppressed() {
        let config = SyncConfig {
            send_empty_batches: false,
            ..SyncConfig::default()
        };
        let (sync, sink) = sync_with(config, FilterConfig::default());

        let report = sync.flush().await;
        assert_eq!(report.outcome, FlushOutcome::SkippedEmpty);
        assert!(sink.batches().is_empty());
    }

    #[tokio::test]
    async fn failed_flush_drops_batch_by_default() {
        let (sync, sink) = open_sync();
        sync.ingest("ALT", 1000).unwrap();
        sink.fail_next_set("connection reset");

        let report = sync.flush().await;
        assert_eq!(report.outcome, FlushOutcome::Failed { requeued: 0 });
        assert_eq!(report.sent, 0);
        assert_eq!(sync.pending_len(), 0);
        assert_eq!(
            sync.metrics()
                .sink_failures_total
                .load(std::sync::atomic::Ordering::Relaxed),
            1
        );
    }

    #[tokio::test]
    async fn failed_flush_requeues_when_enabled() {
        let config = SyncConfig {
            requeue_failed_batches: true,
            ..SyncConfig::default()
        };
        let (sync, sink) = sync_with(config, FilterConfig::default());
        sync.ingest("_ACFT_NAME", "Ka-50").unwrap();
        sync.ingest("ALT", 1000).unwrap();
        sink.fail_next_set("connection reset");

        let report = sync.flush().await;
        assert_eq!(report.outcome, FlushOutcome::Failed { requeued: 2 });
        assert_eq!(report.remaining, 2);

        sync.flush().await;
        assert_eq!(sink.variable("dcs_ALT").unwrap().value, Value::Number(1000.0));
    }

    #[tokio::test]
    async fn notifications_report_capped_counts() {
        let config = SyncConfig {
            max_batch: 300,
            report_ceiling: 200,
            ..SyncConfig::default()
        };
        let (sync, _sink) = sync_with(config, FilterConfig::default());
        let mut rx = sync.subscribe();
        sync.ingest("_ACFT_NAME", "Ka-50").unwrap();
        for i in 0..249u32 {
            sync.ingest(&format!("K{:03}", i), i).unwrap();
        }

        let report = sync.flush().await;
        assert_eq!(report.sent, 250);

        assert_eq!(
            rx.recv().await.unwrap(),
            FlushNotification::BufferDepth(200)
        );
        assert_eq!(rx.recv().await.unwrap(), FlushNotification::Sent(200));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_ingest_and_flush_deliver_latest_value_once() {
        let sink = MockSink::new();
        let sync = Arc::new(Synchronizer::new(
            SyncConfig::default(),
            FilterConfig::default(),
            Arc::new(sink.clone()),
        ));
        sync.ingest("_ACFT_NAME", "Ka-50").unwrap();

        let producer = {
            let sync = Arc::clone(&sync);
            std::thread::spawn(move || {
                for i in 0..2000u32 {
                    sync.ingest(&format!("K{}", i % 50), i).unwrap();
                }
            })
        };

        while !producer.is_finished() {
            sync.flush().await;
            tokio::task::yield_now().await;
        }
        producer.join().unwrap();
        sync.flush().await;
        sync.flush().await;

        assert_eq!(sync.pending_len(), 0);
        for batch in sink.batches() {
            let mut names: Vec<&str> = batch.iter().map(|r| r.name.as_str()).collect();
            let len = names.len();
            names.sort_unstable();
            names.dedup();
            assert_eq!(names.len(), len, "duplicate key within a batch");
        }
        // Every key ends at its last written value
        for k in 0..50u32 {
            let last = 1950 + k;
            assert_eq!(
                sink.variable(&format!("dcs_K{}", k)).unwrap().value,
                Value::from(last)
            );
        }
    }

    /// Sink that holds every call until a permit is released.
    struct GatedSink {
        entered: tokio::sync::Notify,
        release: tokio::sync::Semaphore,
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait::async_trait]
    impl Sink for GatedSink {
        async fn set_variables(&self, _batch: &[VariableRecord]) -> Result<(), SinkError> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            self.entered.notify_one();
            self.release
                .acquire()
                .await
                .map_err(|_| SinkError::Stopped)?
                .forget();
            Ok(())
        }

        async fn stop(&self) -> Result<(), SinkError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn flushes_never_overlap() {
        let sink = Arc::new(GatedSink {
            entered: tokio::sync::Notify::new(),
            release: tokio::sync::Semaphore::new(0),
            calls: std::sync::atomic::AtomicUsize::new(0),
        });
        let sync = Arc::new(Synchronizer::new(
            SyncConfig::default(),
            FilterConfig::default(),
            Arc::clone(&sink),
        ));
        sync.ingest("_ACFT_NAME", "Ka-50").unwrap();
        lock(&sync.state).buffer.clear();

        sync.ingest("ALT", 1000).unwrap();
        let first = tokio::spawn({
            let sync = Arc::clone(&sync);
            async move { sync.flush().await }
        });
        sink.entered.notified().await;

        // First flush is parked inside the sink; the second must wait
        sync.ingest("RPM", 80).unwrap();
        let second = tokio::spawn({
            let sync = Arc::clone(&sync);
            async move { sync.flush().await }
        });
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
        assert!(sync.pending("dcs_RPM").is_some());
        assert_eq!(sink.calls.load(std::sync::atomic::Ordering::SeqCst), 1);

        sink.release.add_permits(2);
        let first = first.await.unwrap();
        let second = second.await.unwrap();

        assert_eq!(first.sent, 1);
        assert_eq!(second.sent, 1);
        assert_eq!(second.depth, 1);
        assert_eq!(sync.pending_len(), 0);
        assert_eq!(sink.calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }
}
