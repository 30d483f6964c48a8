//! Active context tracking.
//!
//! Holds the currently reported context and its resolved allow-list. Both are
//! replaced wholesale on every context change; there are no partial updates.
//!
//! Until a context has been reported, nothing is admitted (cold-start gate).

use std::collections::HashSet;

use crate::filter::ContextFilter;

/// Result of feeding a context-identifying value to [`ActiveContext::observe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextUpdate {
    /// Same context as before, nothing recomputed.
    Unchanged,
    /// The context changed and the allow-list was replaced.
    Switched {
        /// Previously reported context (empty if none).
        from: String,
        /// Newly reported context.
        to: String,
        /// Canonical name the allow-list was looked up under.
        resolved: String,
        /// Size of the new allow-list (0 = unfiltered).
        allowed: usize,
    },
}

/// Admission decision for a telemetry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Forward to deduplication.
    Admitted,
    /// No context known yet.
    NoContext,
    /// Not in the current allow-list.
    Filtered,
}

/// The currently active context and the keys it admits.
#[derive(Debug, Clone, Default)]
pub struct ActiveContext {
    /// Context as reported by the source (empty = none yet).
    current: String,
    /// Allow-list for the current context (empty = admit all).
    allowed: HashSet<String>,
}

impl ActiveContext {
    /// Create an empty context that admits nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a reported context name.
    ///
    /// If it differs from the current one, the context and its allow-list
    /// are replaced.
    pub fn observe(&mut self, reported: &str, filter: &ContextFilter) -> ContextUpdate {
        if reported == self.current {
            return ContextUpdate::Unchanged;
        }

        let resolved = filter.resolve(reported).to_string();
        self.allowed = filter.allow_list_for(&resolved);
        let from = std::mem::replace(&mut self.current, reported.to_string());

        ContextUpdate::Switched {
            from,
            to: reported.to_string(),
            resolved,
            allowed: self.allowed.len(),
        }
    }

    /// Decide whether `key` may be synchronized under the current context.
    pub fn admits(&self, key: &str) -> Admission {
        if self.current.is_empty() {
            Admission::NoContext
        } else if !self.allowed.is_empty() && !self.allowed.contains(key) {
            Admission::Filtered
        } else {
            Admission::Admitted
        }
    }

    /// The current context, if one has been reported.
    pub fn current(&self) -> Option<&str> {
        if self.current.is_empty() {
            None
        } else {
            Some(&self.current)
        }
    }

    /// The active allow-list (empty = unfiltered).
    pub fn allowed(&self) -> &HashSet<String> {
        &self.allowed
    }
}
