//! Remote log collector destinations.

use crate::{CoreError, Level};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Transport used to reach a collector input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Plain HTTP.
    Http,
    /// HTTP over TLS.
    Https,
    /// Single UDP datagram.
    Udp,
}

impl TransportKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TransportKind::Http => "http",
            TransportKind::Https => "https",
            TransportKind::Udp => "udp",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "http" => Ok(TransportKind::Http),
            "https" => Ok(TransportKind::Https),
            "udp" => Ok(TransportKind::Udp),
            other => Err(CoreError::UnknownTransportKind(other.to_string())),
        }
    }
}

/// An immutable description of a remote collector input.
///
/// Equality covers every field. Two destinations that only share a
/// transport kind are different destinations; use [`Destination::same_kind`]
/// when a kind-level comparison is what you want.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Destination {
    kind: TransportKind,
    host: String,
    port: u16,
    max_level: Option<Level>,
}

impl Destination {
    pub fn new(kind: TransportKind, host: impl Into<String>, port: u16) -> Self {
        Self {
            kind,
            host: host.into(),
            port,
            max_level: None,
        }
    }

    pub fn http(host: impl Into<String>, port: u16) -> Self {
        Self::new(TransportKind::Http, host, port)
    }

    pub fn https(host: impl Into<String>, port: u16) -> Self {
        Self::new(TransportKind::Https, host, port)
    }

    pub fn udp(host: impl Into<String>, port: u16) -> Self {
        Self::new(TransportKind::Udp, host, port)
    }

    /// Returns a copy that only accepts events at `max_level` or more severe.
    pub fn with_max_level(mut self, max_level: Level) -> Self {
        self.max_level = Some(max_level);
        self
    }

    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn max_level(&self) -> Option<Level> {
        self.max_level
    }

    /// True when both destinations use the same transport kind.
    pub fn same_kind(&self, other: &Destination) -> bool {
        self.kind == other.kind
    }

    /// True when an event at `level` passes the severity filter.
    pub fn accepts(&self, level: Level) -> bool {
        self.max_level.map_or(true, |max| level <= max)
    }

    /// `host:port`, suitable for socket addressing.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// GELF input URL, e.g. `https://graylog.example.com:12201/gelf`.
    pub fn url(&self) -> String {
        format!("{}://{}:{}/gelf", self.kind, self.host, self.port)
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.kind, self.host, self.port)
    }
}
