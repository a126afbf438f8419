//! Log events.

use chrono::{DateTime, Utc};
use logship_core::Level;
use serde::Serialize;
use serde_json::Value;

/// Hostname reported in events that do not set one.
///
/// Reads `HOSTNAME`, then `/etc/hostname`, then falls back to `localhost`.
pub fn default_hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .or_else(|| std::fs::read_to_string("/etc/hostname").ok())
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

/// A single log event.
///
/// ```ignore
/// let event = LogEvent::new("Upload failed")
///     .with_level(Level::Error)
///     .with_full_message(error.to_string())
///     .field("attempt", 3)
///     .field("bucket", "media");
/// ```
#[derive(Debug, Clone)]
pub struct LogEvent {
    message: String,
    full_message: Option<String>,
    level: Level,
    host: String,
    timestamp: DateTime<Utc>,
    file: Option<String>,
    line: Option<u32>,
    /// Converted values, or the conversion error to report when building.
    fields: Vec<(String, Result<Value, String>)>,
}

impl LogEvent {
    /// New event at [`Level::Alert`], stamped now, from this host.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            full_message: None,
            level: Level::Alert,
            host: default_hostname(),
            timestamp: Utc::now(),
            file: None,
            line: None,
            fields: Vec::new(),
        }
    }

    pub fn with_full_message(mut self, full_message: impl Into<String>) -> Self {
        self.full_message = Some(full_message.into());
        self
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Source location, usually `file!()` and `line!()`.
    pub fn with_location(mut self, file: impl Into<String>, line: u32) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self
    }

    /// Attach an additional field.
    pub fn field(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).map_err(|e| e.to_string());
        self.fields.push((key.into(), value));
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn full_message(&self) -> Option<&str> {
        self.full_message.as_deref()
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    pub fn line(&self) -> Option<u32> {
        self.line
    }

    pub(crate) fn fields(&self) -> &[(String, Result<Value, String>)] {
        &self.fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let event = LogEvent::new("hello");
        assert_eq!(event.message(), "hello");
        assert_eq!(event.level(), Level::Alert);
        assert!(!event.host().is_empty());
        assert!(event.full_message().is_none());
        assert!(event.file().is_none());
    }

    #[test]
    fn test_field_conversion_error_is_kept() {
        let mut bad = HashMap::new();
        bad.insert((1, 2), "tuple keys are not valid JSON object keys");

        let event = LogEvent::new("x").field("ok", 1).field("bad", bad);
        assert!(event.fields()[0].1.is_ok());
        assert!(event.fields()[1].1.is_err());
    }

    #[test]
    fn test_location() {
        let event = LogEvent::new("x").with_location(file!(), line!());
        assert_eq!(event.file(), Some(file!()));
        assert!(event.line().is_some());
    }
}
