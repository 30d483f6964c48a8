//! Error types for variable records.

use thiserror::Error;

use crate::VariableKind;

/// Errors raised while building or updating variable records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// A dynamic value was neither a string nor a number.
    #[error("unsupported value type: {found}")]
    UnsupportedValueType {
        /// Name of the rejected JSON type.
        found: &'static str,
    },

    /// A key was observed with a different kind than on first observation.
    #[error("kind mismatch for {name}: expected {expected}, got {found}")]
    KindMismatch {
        /// The variable name.
        name: String,
        /// Kind fixed at first observation.
        expected: VariableKind,
        /// Kind of the rejected value.
        found: VariableKind,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = RecordError::KindMismatch {
            name: "dcs_ALT".to_string(),
            expected: VariableKind::Number,
            found: VariableKind::String,
        };
        assert_eq!(
            err.to_string(),
            "kind mismatch for dcs_ALT: expected NUMBER, got STRING"
        );
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RecordError>();
    }
}
