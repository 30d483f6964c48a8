//! Mock sink for testing.
//!
//! Captures every batch and keeps a merged view of the resulting sink state.

use super::{Sink, SinkError};
use async_trait::async_trait;
use dcs_feeder_types::VariableRecord;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Mock sink for testing.
///
/// Clones share state, so a test can keep one handle while the synchronizer
/// owns another.
#[derive(Debug, Default, Clone)]
pub struct MockSink {
    inner: Arc<Mutex<MockSinkInner>>,
}

#[derive(Debug, Default)]
struct MockSinkInner {
    batches: Vec<Vec<VariableRecord>>,
    state: HashMap<String, VariableRecord>,
    stopped: bool,
    fail_next_set: Option<String>,
}

impl MockSink {
    /// Create a new mock sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all batches that were delivered, in call order.
    pub fn batches(&self) -> Vec<Vec<VariableRecord>> {
        let inner = self.inner.lock().unwrap();
        inner.batches.clone()
    }

    /// Get the last delivered batch.
    pub fn last_batch(&self) -> Option<Vec<VariableRecord>> {
        let inner = self.inner.lock().unwrap();
        inner.batches.last().cloned()
    }

    /// Current sink-side value of a variable.
    pub fn variable(&self, name: &str) -> Option<VariableRecord> {
        let inner = self.inner.lock().unwrap();
        inner.state.get(name).cloned()
    }

    /// Whether `stop()` has been called.
    pub fn is_stopped(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.stopped
    }

    /// Cause the next `set_variables()` to fail with the given error.
    pub fn fail_next_set(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_set = Some(error.to_string());
    }

    /// Clear all captured state.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        *inner = MockSinkInner::default();
    }
}

#[async_trait]
impl Sink for MockSink {
    async fn set_variables(&self, batch: &[VariableRecord]) -> Result<(), SinkError> {
        let mut inner = self.inner.lock().unwrap();

        if inner.stopped {
            return Err(SinkError::Stopped);
        }

        // Check for forced failure
        if let Some(error) = inner.fail_next_set.take() {
            return Err(SinkError::WriteFailed(error));
        }

        for record in batch {
            inner.state.insert(record.name.clone(), record.clone());
        }
        inner.batches.push(batch.to_vec());
        Ok(())
    }

    async fn stop(&self) -> Result<(), SinkError> {
        let mut inner = self.inner.lock().unwrap();
        inner.stopped = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcs_feeder_types::Value;

    #[tokio::test]
    async fn mock_sink_captures_batches() {
        let sink = MockSink::new();

        sink.set_variables(&[VariableRecord::new("dcs_ALT", 1000)])
            .await
            .unwrap();
        sink.set_variables(&[VariableRecord::new("dcs_ALT", 1100)])
            .await
            .unwrap();

        assert_eq!(sink.batches().len(), 2);
        assert_eq!(
            sink.variable("dcs_ALT").unwrap().value,
            Value::Number(1100.0)
        );
    }

    #[tokio::test]
    async fn forced_set_failure() {
        let sink = MockSink::new();
        sink.fail_next_set("connection reset");

        let result = sink.set_variables(&[VariableRecord::new("dcs_ALT", 1)]).await;
        assert!(matches!(result, Err(SinkError::WriteFailed(_))));
        assert!(sink.batches().is_empty());

        // Next set should work
        sink.set_variables(&[VariableRecord::new("dcs_ALT", 1)])
            .await
            .unwrap();
        assert_eq!(sink.batches().len(), 1);
    }

    #[tokio::test]
    async fn stopped_sink_rejects_writes() {
        let sink = MockSink::new();
        sink.stop().await.unwrap();

        assert!(sink.is_stopped());
        let result = sink.set_variables(&[]).await;
        assert!(matches!(result, Err(SinkError::Stopped)));
    }

    #[tokio::test]
    async fn clone_shares_state() {
        let sink1 = MockSink::new();
        let sink2 = sink1.clone();

        sink1.set_variables(&[VariableRecord::new("a", 1)]).await.unwrap();
        assert_eq!(sink2.batches().len(), 1);

        sink2.reset();
        assert!(sink1.batches().is_empty());
    }
}
