//! Last-value store used to suppress redundant writes.
//!
//! Entries are created on first observation of a key and updated every time
//! a changed value is accepted. Nothing is ever evicted: the store grows with
//! the number of distinct keys, which the telemetry protocol bounds.

use dcs_feeder_types::{RecordError, Value};
use std::collections::HashMap;

/// Outcome of comparing a value against the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// Key has never been seen.
    New,
    /// Key is known and the value differs.
    Changed,
    /// Key is known and the value is identical (string form).
    Unchanged,
}

impl Observation {
    /// Whether the value should be staged for the sink.
    pub fn is_change(self) -> bool {
        !matches!(self, Observation::Unchanged)
    }
}

/// Mapping from key to last accepted value.
#[derive(Debug, Default, Clone)]
pub struct DedupStore {
    last: HashMap<String, Value>,
}

impl DedupStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare `value` with the last accepted value for `key` without mutating.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::KindMismatch`] when `value` has a different
    /// kind than the one first observed for `key`.
    pub fn observe(&self, key: &str, value: &Value) -> Result<Observation, RecordError> {
        let Some(last) = self.last.get(key) else {
            return Ok(Observation::New);
        };

        if last.kind() != value.kind() {
            return Err(RecordError::KindMismatch {
                name: key.to_string(),
                expected: last.kind(),
                found: value.kind(),
            });
        }

        if last.same_as(value) {
            Ok(Observation::Unchanged)
        } else {
            Ok(Observation::Changed)
        }
    }

    /// Record `value` as the last accepted value for `key`.
    pub fn accept(&mut self, key: &str, value: Value) {
        match self.last.get_mut(key) {
            Some(slot) => *slot = value,
            None => {
                self.last.insert(key.to_string(), value);
            }
        }
    }

    /// The last accepted value for `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.last.get(key)
    }

    /// Number of distinct keys seen.
    pub fn len(&self) -> usize {
        self.last.len()
    }

    /// Check if no key has been seen yet.
    pub fn is_empty(&self) -> bool {
        self.last.is_empty()
    }
}
