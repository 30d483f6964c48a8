//! Run the feeder on stdin telemetry.

use anyhow::{Context, Result};
use dcs_feeder_sync::{Config, Feeder, FlushOutcome, Sink, StdoutSink, UdpUpstream};
use dcs_feeder_types::{Value, VariableRecord, VariablesChanged};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::input::{parse_line, Line};

/// Run the feeder until stdin closes or ctrl-c is received.
pub async fn run(mut config: Config, upstream: Option<String>) -> Result<()> {
    if let Some(address) = upstream {
        config.upstream.address = address;
    }

    let sink = Arc::new(StdoutSink::new(&config.sink.app_name));
    let upstream = UdpUpstream::bind(&config.upstream.address)
        .await
        .with_context(|| format!("Failed to open upstream {}", config.upstream.address))?;

    tracing::info!(
        "Feeding {} (batch {}, every {}ms)",
        config.sink.app_name,
        config.sync.max_batch,
        config.sync.flush_interval_ms
    );
    if config.command.enabled {
        tracing::info!(
            "Forwarding {} to {}",
            config.command.key,
            upstream.target()
        );
    }

    let command_key = config.command.key.clone();
    let feeder = Feeder::start(config, sink, Arc::new(upstream))
        .await
        .context("Failed to start feeder")?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line.context("Failed to read stdin")? {
                    Some(line) => handle_line(&feeder, &command_key, &line).await,
                    None => {
                        tracing::info!("Input closed");
                        drain(&feeder).await;
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
        }
    }

    let pending = feeder.synchronizer().pending_len();
    if pending > 0 {
        tracing::warn!("Stopping with {} unsent changes", pending);
    }
    feeder.shutdown().await.context("Failed to stop feeder")?;
    Ok(())
}

async fn handle_line<S: Sink>(feeder: &Feeder<S>, command_key: &str, line: &str) {
    let parsed = match parse_line(line) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!("Skipping line: {}", e);
            return;
        }
    };

    match parsed {
        Line::Skip => {}
        Line::Update { key, raw } => {
            if let Err(e) = feeder.synchronizer().ingest_raw(&key, &raw) {
                tracing::warn!("Rejected {}: {}", key, e);
            }
        }
        Line::Text { key, text } => {
            if let Err(e) = feeder.ingest(&key, Value::Text(text)) {
                tracing::warn!("Rejected {}: {}", key, e);
            }
        }
        Line::Json(map) => {
            let sync = feeder.synchronizer();
            for (key, value) in map {
                if let Err(e) = sync.ingest_json(&key, value) {
                    tracing::warn!("Rejected {}: {}", key, e);
                }
            }
        }
        Line::RemoteSet { name, value } => {
            let Some(notifier) = feeder.notifier() else {
                tracing::warn!("Ignoring !SET {}: command relay disabled", name);
                return;
            };
            let record = remote_record(command_key, name, value);
            if notifier.send(VariablesChanged::single(record)).await.is_err() {
                tracing::warn!("Command relay stopped");
            }
        }
    }
}

/// Flush until the buffer is empty or the sink stops accepting batches.
async fn drain<S: Sink>(feeder: &Feeder<S>) {
    let sync = feeder.synchronizer();
    while sync.pending_len() > 0 {
        let report = sync.flush().await;
        if report.outcome != FlushOutcome::Delivered {
            break;
        }
    }
}

/// Build the record a sink would report for a changed variable.
fn remote_record(command_key: &str, name: String, value: String) -> VariableRecord {
    if name == command_key {
        VariableRecord::command(name, value)
    } else {
        VariableRecord::new(name, Value::infer(&value))
    }
}
