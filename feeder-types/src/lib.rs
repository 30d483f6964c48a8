//! # feeder-types
//!
//! Shared data types for the dcs-feeder synchronizer.
//!
//! This crate provides the foundational types used across all dcs-feeder crates:
//! - [`VariableRecord`], [`Value`], [`VariableKind`] - The value container exchanged with the sink
//! - [`VariablesChanged`] - Change notification delivered by the sink
//! - [`FlushNotification`] - Observability events emitted at flush time
//! - [`RecordError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod events;
mod record;

pub use error::RecordError;
pub use events::{FlushNotification, VariablesChanged};
pub use record::{Value, VariableKind, VariableRecord};
