//! Telemetry line parsing for `dcs-feeder run`.
//!
//! Accepted forms, one per line:
//!
//! - `KEY VALUE` telemetry update; the value's kind is decided per key by
//!   the synchronizer
//! - `KEY "VALUE"` telemetry update that is always text
//! - `{"KEY": value, ...}` JSON object of updates
//! - `!SET NAME VALUE` a variable changed on the sink side
//! - blank lines and lines starting with `#` are ignored

use thiserror::Error;

/// Prefix marking a simulated sink-side change.
const REMOTE_SET: &str = "!SET";

/// One parsed input line.
#[derive(Debug, Clone, PartialEq)]
pub enum Line {
    /// A single telemetry update with an untyped token.
    Update { key: String, raw: String },
    /// A single telemetry update quoted as text.
    Text { key: String, text: String },
    /// A JSON object of telemetry updates.
    Json(serde_json::Map<String, serde_json::Value>),
    /// A variable the sink reports as changed.
    RemoteSet { name: String, value: String },
    /// Nothing to do.
    Skip,
}

/// Why a line could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// `KEY` with no value.
    #[error("no value for key {0}")]
    MissingValue(String),
    /// `!SET` without a variable name.
    #[error("!SET needs a variable name")]
    MissingName,
    /// Line looked like JSON but was not an object.
    #[error("invalid JSON object: {0}")]
    InvalidJson(String),
}

/// Parse one input line.
pub fn parse_line(line: &str) -> Result<Line, ParseError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(Line::Skip);
    }

    if line.starts_with('{') {
        return match serde_json::from_str::<serde_json::Value>(line) {
            Ok(serde_json::Value::Object(map)) => Ok(Line::Json(map)),
            Ok(other) => Err(ParseError::InvalidJson(format!("found {}", other))),
            Err(e) => Err(ParseError::InvalidJson(e.to_string())),
        };
    }

    let (head, rest) = split_word(line);

    if head == REMOTE_SET {
        let (name, value) = split_word(rest);
        if name.is_empty() {
            return Err(ParseError::MissingName);
        }
        return Ok(Line::RemoteSet {
            name: name.to_string(),
            value: value.to_string(),
        });
    }

    if rest.is_empty() {
        return Err(ParseError::MissingValue(head.to_string()));
    }

    if let Some(text) = unquote(rest) {
        return Ok(Line::Text {
            key: head.to_string(),
            text: text.to_string(),
        });
    }

    Ok(Line::Update {
        key: head.to_string(),
        raw: rest.to_string(),
    })
}

/// Split off the first whitespace-delimited word; the remainder is trimmed.
fn split_word(s: &str) -> (&str, &str) {
    match s.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (s, ""),
    }
}

/// Strip one pair of surrounding double quotes.
fn unquote(s: &str) -> Option<&str> {
    s.strip_prefix('"')?.strip_suffix('"')
}
