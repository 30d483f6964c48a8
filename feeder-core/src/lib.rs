//! # feeder-core
//!
//! Pure logic for dcs-feeder (no I/O, instant tests).
//!
//! This crate implements the data structures behind the synchronizer
//! without any locking, scheduling, network or disk I/O.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Easy reasoning about admission and batching decisions
//!
//! Locking, flush scheduling and the sink/upstream I/O live in `feeder-sync`,
//! which owns instances of these types behind its own synchronization.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod buffer;
pub mod context;
pub mod dedup;
pub mod filter;

pub use buffer::ChangeBuffer;
pub use context::{ActiveContext, Admission, ContextUpdate};
pub use dedup::{DedupStore, Observation};
pub use filter::{ContextFilter, FilterConfig};
