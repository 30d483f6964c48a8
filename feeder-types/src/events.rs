//! Notifications flowing in and out of the synchronizer.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::VariableRecord;

/// Change notification delivered by the sink whenever its own state changes.
///
/// This includes changes the synchronizer itself just wrote, so consumers
/// must tolerate seeing their own writes come back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariablesChanged {
    /// Names of the variables that changed.
    pub changed: HashSet<String>,
    /// Current sink-side state of the variables.
    pub current: HashMap<String, VariableRecord>,
}

impl VariablesChanged {
    /// Build a notification for a single changed record.
    pub fn single(record: VariableRecord) -> Self {
        let mut changed = HashSet::new();
        changed.insert(record.name.clone());
        let mut current = HashMap::new();
        current.insert(record.name.clone(), record);
        Self { changed, current }
    }

    /// The current record for `name`, if it is among the changed keys.
    pub fn changed_record(&self, name: &str) -> Option<&VariableRecord> {
        if self.changed.contains(name) {
            self.current.get(name)
        } else {
            None
        }
    }
}

/// Observability events emitted after each flush.
///
/// Counts are capped at the configured reporting ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlushNotification {
    /// Buffer depth observed at flush time, before anything was taken.
    BufferDepth(usize),
    /// Number of records actually handed to the sink.
    Sent(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn changed_record_requires_membership() {
        let mut event = VariablesChanged::single(VariableRecord::command("dcs_command", "X"));
        assert!(event.changed_record("dcs_command").is_some());

        event.changed.clear();
        assert!(event.changed_record("dcs_command").is_none());
        assert!(event.changed_record("dcs_other").is_none());
    }
}
