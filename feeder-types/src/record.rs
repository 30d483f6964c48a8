//! Variable records exchanged with the sink.
//!
//! A [`VariableRecord`] carries a name, a typed [`Value`] and the explicit
//! [`VariableKind`] tag the sink's wire encoding depends on.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

use crate::RecordError;

/// Wire tag for a variable's value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VariableKind {
    /// Text value.
    String,
    /// Numeric value.
    Number,
}

impl fmt::Display for VariableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableKind::String => f.write_str("STRING"),
            VariableKind::Number => f.write_str("NUMBER"),
        }
    }
}

/// A scalar telemetry value.
///
/// Equality for synchronization purposes is decided on the string form
/// (see [`Value::same_as`]), not on numeric tolerance. Whole numbers are
/// serialized without a fraction, matching [`fmt::Display`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Text value.
    Text(String),
    /// Numeric value.
    Number(f64),
}

impl Value {
    /// The kind tag matching this value.
    pub fn kind(&self) -> VariableKind {
        match self {
            Value::Text(_) => VariableKind::String,
            Value::Number(_) => VariableKind::Number,
        }
    }

    /// Parse a raw token without losing information.
    ///
    /// A token becomes [`Value::Number`] only if the number renders back to
    /// the same text, so `"80"` is numeric while `"251.000"` or `"007"` stay
    /// text.
    pub fn infer(raw: &str) -> Self {
        match Self::parse_number(raw) {
            Some(n) if n.to_string() == raw.trim() => Value::Number(n),
            _ => Value::Text(raw.to_string()),
        }
    }

    /// Parse a raw token as a finite number, accepting any spelling.
    pub fn parse_number(raw: &str) -> Option<f64> {
        raw.trim().parse::<f64>().ok().filter(|n| n.is_finite())
    }

    /// Compare two values by their string form.
    pub fn same_as(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Text(a), Value::Text(b)) => a == b,
            _ => self.to_string() == other.to_string(),
        }
    }

    /// The text payload, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            Value::Number(_) => None,
        }
    }

    /// Whether this is an empty text value.
    pub fn is_empty_text(&self) -> bool {
        matches!(self, Value::Text(s) if s.is_empty())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => f.write_str(s),
            Value::Number(n) => write!(f, "{}", n),
        }
    }
}

/// Largest magnitude below which every integer is exactly representable.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Text(s) => serializer.serialize_str(s),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < MAX_EXACT_INTEGER => {
                serializer.serialize_i64(*n as i64)
            }
            Value::Number(n) => serializer.serialize_f64(*n),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<u16> for Value {
    fn from(n: u16) -> Self {
        Value::Number(f64::from(n))
    }
}

impl TryFrom<serde_json::Value> for Value {
    type Error = RecordError;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        use serde_json::Value as Json;

        match value {
            Json::String(s) => Ok(Value::Text(s)),
            Json::Number(n) => n
                .as_f64()
                .map(Value::Number)
                .ok_or(RecordError::UnsupportedValueType { found: "number" }),
            Json::Null => Err(RecordError::UnsupportedValueType { found: "null" }),
            Json::Bool(_) => Err(RecordError::UnsupportedValueType { found: "bool" }),
            Json::Array(_) => Err(RecordError::UnsupportedValueType { found: "array" }),
            Json::Object(_) => Err(RecordError::UnsupportedValueType { found: "object" }),
        }
    }
}

/// A named variable as stored by the sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableRecord {
    /// Variable name, unique within a batch.
    pub name: String,
    /// Current value.
    pub value: Value,
    /// Wire tag mirroring `value`.
    pub kind: VariableKind,
    /// Whether the sink keeps the variable across its own restarts.
    #[serde(default)]
    pub is_persistent: bool,
    /// Whether users may edit the variable from the sink side.
    #[serde(default)]
    pub is_user_editable: bool,
}

impl VariableRecord {
    /// Create a record, inferring the kind from the value.
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        let value = value.into();
        Self {
            name: name.into(),
            kind: value.kind(),
            value,
            is_persistent: false,
            is_user_editable: false,
        }
    }

    /// Create the persistent, user-editable text record used as a command channel.
    pub fn command(name: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            is_persistent: true,
            is_user_editable: true,
            ..Self::new(name, Value::Text(payload.into()))
        }
    }

    /// Replace the value, keeping the kind fixed.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::KindMismatch`] if the new value has a different kind.
    pub fn set_value(&mut self, value: Value) -> Result<(), RecordError> {
        if value.kind() != self.kind {
            return Err(RecordError::KindMismatch {
                name: self.name.clone(),
                expected: self.kind,
                found: value.kind(),
            });
        }
        self.value = value;
        Ok(())
    }
}
