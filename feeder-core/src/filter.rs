//! Context-scoped allow-lists.
//!
//! A context is the active module identity reported by the telemetry source
//! (for DCS-BIOS, the aircraft name). Each context may carry an allow-list of
//! keys; cross-cutting groups (common data, metadata) are unioned into every
//! configured context.
//!
//! [`ContextFilter`] is a pure function of its [`FilterConfig`]. The mutable
//! "which context is active" state lives in [`crate::ActiveContext`].

use serde::Deserialize;
use std::collections::{HashMap, HashSet};

/// Allow-list configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FilterConfig {
    /// Allow-listed keys per canonical context name.
    #[serde(default)]
    pub contexts: HashMap<String, Vec<String>>,
    /// Alias name → canonical context name.
    #[serde(default)]
    pub aliases: HashMap<String, String>,
    /// Keys admitted under every configured context.
    #[serde(default)]
    pub common: Vec<String>,
    /// Metadata keys emitted at the start of each telemetry frame.
    #[serde(default)]
    pub metadata_start: Vec<String>,
    /// Metadata keys emitted at the end of each telemetry frame.
    #[serde(default)]
    pub metadata_end: Vec<String>,
}

impl FilterConfig {
    /// Add an allow-list for a context.
    pub fn with_context<I, S>(mut self, context: &str, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.contexts.insert(
            context.to_string(),
            keys.into_iter().map(Into::into).collect(),
        );
        self
    }

    /// Register `alias` as another name for `context`.
    pub fn with_alias(mut self, alias: &str, context: &str) -> Self {
        self.aliases.insert(alias.to_string(), context.to_string());
        self
    }

    /// Set the keys shared by every configured context.
    pub fn with_common<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.common = keys.into_iter().map(Into::into).collect();
        self
    }
}

/// Resolves context names and composes their allow-lists.
#[derive(Debug, Clone, Default)]
pub struct ContextFilter {
    config: FilterConfig,
}

impl ContextFilter {
    /// Create a filter from configuration.
    pub fn new(config: FilterConfig) -> Self {
        Self { config }
    }

    /// The underlying configuration.
    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Map a reported context name to its canonical name.
    ///
    /// Directly configured names win over aliases; unknown names resolve to
    /// themselves.
    pub fn resolve<'a>(&'a self, candidate: &'a str) -> &'a str {
        if self.config.contexts.contains_key(candidate) {
            return candidate;
        }
        self.config
            .aliases
            .get(candidate)
            .map(String::as_str)
            .unwrap_or(candidate)
    }

    /// Compose the allow-list for a canonical context.
    ///
    /// Returns the context's own keys plus the common and metadata groups.
    /// An unconfigured context yields an empty set, which admits everything.
    pub fn allow_list_for(&self, context: &str) -> HashSet<String> {
        let Some(keys) = self.config.contexts.get(context) else {
            return HashSet::new();
        };

        keys.iter()
            .chain(&self.config.common)
            .chain(&self.config.metadata_start)
            .chain(&self.config.metadata_end)
            .cloned()
            .collect()
    }
}
