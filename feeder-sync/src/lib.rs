//! # feeder-sync
//!
//! Change-buffered synchronizer between DCS-BIOS telemetry and a variable sink.
//!
//! This is the main library the feeder binary is built on.
//!
//! ## Features
//!
//! - **Deduplication**: only values that changed since the last accepted one are sent
//! - **Context Filtering**: per-aircraft allow-lists, switched at runtime
//! - **Bounded Batches**: at most `max_batch` records per flush, remainder carried over
//! - **Command Relay**: a user-editable sink variable forwarded back to DCS-BIOS
//! - **Pluggable I/O**: [`Sink`] and [`Upstream`] traits with mock implementations
//!
//! ## Example
//!
//! ```ignore
//! use dcs_feeder_sync::{Config, Feeder, MockSink, MockUpstream};
//!
//! let feeder = Feeder::start(Config::default(), Arc::new(MockSink::new()), Arc::new(MockUpstream::new())).await?;
//!
//! feeder.ingest("_ACFT_NAME", "F-16C_50")?;
//! feeder.ingest("ALT", 1000)?;
//!
//! feeder.shutdown().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod feeder;
pub mod metrics;
pub mod relay;
pub mod scheduler;
pub mod sink;
pub mod synchronizer;
pub mod upstream;

pub use config::{CommandConfig, Config, ConfigError, SinkConfig, SyncConfig, UpstreamConfig};
pub use error::{FeederError, Result};
pub use feeder::Feeder;
pub use metrics::SyncMetrics;
pub use relay::{spawn_relay_task, CommandRelay, RelayOutcome};
pub use scheduler::{spawn_flush_task, FlushTaskHandle};
pub use sink::{MockSink, Sink, SinkError, StdoutSink};
pub use synchronizer::{FlushOutcome, FlushReport, Ingest, Synchronizer};
pub use upstream::{MockUpstream, UdpUpstream, Upstream, UpstreamError, DEFAULT_IMPORT_ADDRESS};
