//! Line-oriented JSON sink.
//!
//! Writes every batch as one JSON object per line, tagged with the
//! application name the sink was configured with. Used by the CLI when no
//! variable server is attached, and handy for piping into other tools.

use super::{Sink, SinkError};
use async_trait::async_trait;
use dcs_feeder_types::VariableRecord;
use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt, Stdout};
use tokio::sync::Mutex;

#[derive(Serialize)]
struct BatchLine<'a> {
    app: &'a str,
    variables: &'a [VariableRecord],
}

/// Sink that prints batches as JSON lines.
pub struct StdoutSink<W = Stdout> {
    app_name: String,
    out: Mutex<Option<W>>,
}

impl StdoutSink<Stdout> {
    /// Create a sink writing to standard output.
    pub fn new(app_name: &str) -> Self {
        Self::with_writer(app_name, tokio::io::stdout())
    }
}

impl<W> StdoutSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    /// Create a sink writing to an arbitrary writer.
    pub fn with_writer(app_name: &str, writer: W) -> Self {
        Self {
            app_name: app_name.to_string(),
            out: Mutex::new(Some(writer)),
        }
    }

    /// Take the writer back, leaving the sink stopped.
    pub fn into_writer(self) -> Option<W> {
        self.out.into_inner()
    }
}

impl<W> std::fmt::Debug for StdoutSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdoutSink")
            .field("app_name", &self.app_name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<W> Sink for StdoutSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn set_variables(&self, batch: &[VariableRecord]) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(&BatchLine {
            app: &self.app_name,
            variables: batch,
        })?;
        line.push(b'\n');

        let mut guard = self.out.lock().await;
        let out = guard.as_mut().ok_or(SinkError::Stopped)?;
        out.write_all(&line).await?;
        out.flush().await?;
        Ok(())
    }

    async fn stop(&self) -> Result<(), SinkError> {
        let mut guard = self.out.lock().await;
        if let Some(mut out) = guard.take() {
            out.shutdown().await?;
        }
        Ok(())
    }
}
