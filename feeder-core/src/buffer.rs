//! Change buffer for dcs-feeder.
//!
//! This module provides the staging area between ingestion and flush:
//! - One pending record per key (last write wins within an interval)
//! - Deterministic, name-ordered iteration
//! - Bounded batch extraction; anything past the cap stays for the next flush
//!
//! The buffer is owned by the synchronizer in feeder-sync, which guards it
//! with the same lock as the dedup store.

use dcs_feeder_types::{RecordError, Value, VariableRecord};
use std::collections::BTreeMap;

/// Records known to have changed and not yet flushed.
#[derive(Debug, Default, Clone)]
pub struct ChangeBuffer {
    pending: BTreeMap<String, VariableRecord>,
}

impl ChangeBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage `value` for `name`.
    ///
    /// Creates a record with the kind inferred from `value` if the key is not
    /// buffered yet, otherwise only the value is replaced.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::KindMismatch`] if a buffered record has a
    /// different kind.
    pub fn upsert(&mut self, name: &str, value: Value) -> Result<(), RecordError> {
        match self.pending.get_mut(name) {
            Some(record) => record.set_value(value),
            None => {
                self.pending
                    .insert(name.to_string(), VariableRecord::new(name, value));
                Ok(())
            }
        }
    }

    /// Remove and return up to `max` records.
    ///
    /// If the buffer holds at least `max` records exactly `max` are taken
    /// (lowest names first); otherwise the whole buffer is drained.
    pub fn take_batch(&mut self, max: usize) -> Vec<VariableRecord> {
        if self.pending.len() <= max {
            return std::mem::take(&mut self.pending).into_values().collect();
        }

        let split_key = self
            .pending
            .keys()
            .nth(max)
            .cloned()
            .unwrap_or_default();
        let rest = self.pending.split_off(&split_key);
        std::mem::replace(&mut self.pending, rest)
            .into_values()
            .collect()
    }

    /// Put records from a failed delivery back.
    ///
    /// Records whose key has been re-buffered since are skipped, so newer
    /// values always win. Returns the number of records restored.
    pub fn requeue(&mut self, records: Vec<VariableRecord>) -> usize {
        let mut restored = 0;
        for record in records {
            if !self.pending.contains_key(&record.name) {
                self.pending.insert(record.name.clone(), record);
                restored += 1;
            }
        }
        restored
    }

    /// The pending record for `name`.
    pub fn get(&self, name: &str) -> Option<&VariableRecord> {
        self.pending.get(name)
    }

    /// Number of pending records.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drop all pending records.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
