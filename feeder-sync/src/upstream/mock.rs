//! Mock upstream for testing.

use super::{Upstream, UpstreamError};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Mock upstream that records forwarded payloads.
#[derive(Debug, Default, Clone)]
pub struct MockUpstream {
    inner: Arc<Mutex<MockUpstreamInner>>,
}

#[derive(Debug, Default)]
struct MockUpstreamInner {
    sent: Vec<String>,
    fail_next_send: Option<String>,
}

impl MockUpstream {
    /// Create a new mock upstream.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all payloads that were forwarded.
    pub fn sent(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        inner.sent.clone()
    }

    /// Cause the next `send_raw()` to fail with the given error.
    pub fn fail_next_send(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_send = Some(error.to_string());
    }
}

#[async_trait]
impl Upstream for MockUpstream {
    async fn send_raw(&self, payload: &str) -> Result<(), UpstreamError> {
        let mut inner = self.inner.lock().unwrap();

        if let Some(error) = inner.fail_next_send.take() {
            return Err(UpstreamError::SendFailed(error));
        }

        inner.sent.push(payload.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_payloads_in_order() {
        let upstream = MockUpstream::new();
        upstream.send_raw("MASTER_ARM 1").await.unwrap();
        upstream.send_raw("MASTER_ARM 0").await.unwrap();

        assert_eq!(upstream.sent(), vec!["MASTER_ARM 1", "MASTER_ARM 0"]);
    }

    #[tokio::test]
    async fn forced_send_failure() {
        let upstream = MockUpstream::new();
        upstream.fail_next_send("socket closed");

        assert!(upstream.send_raw("X 1").await.is_err());
        assert!(upstream.sent().is_empty());
    }
}
