//! GELF payload construction.
//!
//! Reference: <https://go2docs.graylog.org/current/getting_in_log_data/gelf.html>

use crate::{InputError, InputResult, LogEvent};
use serde_json::{Map, Value};

pub const GELF_VERSION: &str = "1.1";

/// Longest string value sent, in characters.
pub const MAX_FIELD_CHARS: usize = 32000;

const ELLIPSIS: char = '…';

#[derive(Debug, Clone, Copy, Default)]
pub struct PayloadOptions {
    /// Add `_file` and `_line` from the event's source location.
    pub include_file_line: bool,
}

fn truncate(value: &str) -> String {
    if value.chars().count() <= MAX_FIELD_CHARS {
        return value.to_string();
    }
    let mut truncated: String = value.chars().take(MAX_FIELD_CHARS - 1).collect();
    truncated.push(ELLIPSIS);
    truncated
}

/// Map a caller key to its GELF additional-field name.
fn field_name(key: &str) -> InputResult<String> {
    let key = key.trim().replace(' ', "_");
    if key.is_empty() {
        return Err(InputError::InvalidFieldName(key));
    }
    if key == "id" || key == "_id" {
        return Err(InputError::ReservedField(key));
    }
    if key.starts_with('_') || key == "full_message" {
        Ok(key)
    } else {
        Ok(format!("_{key}"))
    }
}

/// Nested values are sent as JSON strings; strings are truncated.
fn field_value(value: &Value) -> InputResult<Value> {
    Ok(match value {
        Value::Object(_) | Value::Array(_) => Value::String(truncate(&serde_json::to_string(value)?)),
        Value::String(s) => Value::String(truncate(s)),
        other => other.clone(),
    })
}

/// Build the GELF document for `event`.
pub fn build_payload(event: &LogEvent, options: &PayloadOptions) -> InputResult<Map<String, Value>> {
    let mut payload = Map::new();
    payload.insert("version".into(), GELF_VERSION.into());
    payload.insert("host".into(), event.host().into());
    payload.insert("short_message".into(), event.message().into());
    payload.insert(
        "timestamp".into(),
        (event.timestamp().timestamp_millis() as f64 / 1000.0).into(),
    );
    payload.insert("level".into(), event.level().code().into());
    if let Some(full_message) = event.full_message() {
        payload.insert("full_message".into(), truncate(full_message).into());
    }

    if options.include_file_line {
        if let Some(file) = event.file() {
            payload.insert("_file".into(), truncate(file).into());
        }
        if let Some(line) = event.line() {
            payload.insert("_line".into(), line.into());
        }
    }

    for (key, value) in event.fields() {
        let name = field_name(key)?;
        let value = value.as_ref().map_err(|message| InputError::FieldConversion {
            key: key.clone(),
            message: message.clone(),
        })?;
        payload.insert(name, field_value(value)?);
    }

    Ok(payload)
}

/// Encode a payload as JSON bytes.
pub fn serialize_payload(payload: &Map<String, Value>) -> InputResult<Vec<u8>> {
    let bytes = serde_json::to_vec(payload)?;
    if bytes.is_empty() {
        return Err(InputError::EmptyPayload);
    }
    Ok(bytes)
}
