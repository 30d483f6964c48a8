//! Operational metrics for the synchronizer.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

/// Operational metrics for monitoring synchronizer activity.
///
/// All counters are monotonically increasing (reset only on restart).
#[derive(Debug, Default)]
pub struct SyncMetrics {
    /// Telemetry updates received.
    pub ingested_total: AtomicU64,
    /// Updates staged in the change buffer.
    pub buffered_total: AtomicU64,
    /// Updates suppressed by deduplication.
    pub unchanged_total: AtomicU64,
    /// Updates dropped by the context allow-list.
    pub filtered_total: AtomicU64,
    /// Updates dropped because no context was known yet.
    pub gated_total: AtomicU64,
    /// Updates rejected for their value type.
    pub rejected_total: AtomicU64,
    /// Context switches observed.
    pub context_switches_total: AtomicU64,
    /// Flushes performed.
    pub flushes_total: AtomicU64,
    /// Records handed to the sink successfully.
    pub records_sent_total: AtomicU64,
    /// Failed sink writes.
    pub sink_failures_total: AtomicU64,
    /// Commands forwarded upstream.
    pub commands_forwarded_total: AtomicU64,
    /// Commands whose forward failed.
    pub command_failures_total: AtomicU64,
}

impl SyncMetrics {
    /// Increment a counter by one.
    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Render all counters in Prometheus text format.
    pub fn render_prometheus(&self) -> String {
        let counters: [(&str, &str, &AtomicU64); 12] = [
            ("ingested_total", "Telemetry updates received", &self.ingested_total),
            ("buffered_total", "Updates staged for the sink", &self.buffered_total),
            ("unchanged_total", "Updates suppressed as duplicates", &self.unchanged_total),
            ("filtered_total", "Updates outside the context allow-list", &self.filtered_total),
            ("gated_total", "Updates received before any context", &self.gated_total),
            ("rejected_total", "Updates rejected for their value type", &self.rejected_total),
            ("context_switches_total", "Context switches observed", &self.context_switches_total),
            ("flushes_total", "Flushes performed", &self.flushes_total),
            ("records_sent_total", "Records delivered to the sink", &self.records_sent_total),
            ("sink_failures_total", "Failed sink writes", &self.sink_failures_total),
            ("commands_forwarded_total", "Commands forwarded upstream", &self.commands_forwarded_total),
            ("command_failures_total", "Commands that failed to forward", &self.command_failures_total),
        ];

        let mut body = String::new();
        for (name, help, counter) in counters {
            let _ = writeln!(body, "# HELP dcs_feeder_{name} {help}");
            let _ = writeln!(body, "# TYPE dcs_feeder_{name} counter");
            let _ = writeln!(
                body,
                "dcs_feeder_{name} {}\n",
                counter.load(Ordering::Relaxed)
            );
        }
        body
    }
}
