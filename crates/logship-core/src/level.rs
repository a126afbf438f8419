//! Syslog severity levels.

use crate::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Syslog severity carried in GELF payloads and used as a destination filter.
///
/// Lower numeric values are more severe, so `Level::Alert < Level::Debug`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Alert = 1,
    Critical = 2,
    Error = 3,
    Warning = 4,
    Notice = 5,
    Informational = 6,
    Debug = 7,
}

impl Level {
    /// All levels, most severe first.
    pub const ALL: [Level; 7] = [
        Level::Alert,
        Level::Critical,
        Level::Error,
        Level::Warning,
        Level::Notice,
        Level::Informational,
        Level::Debug,
    ];

    /// Numeric syslog code.
    pub fn code(self) -> i64 {
        self as i64
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Alert => "alert",
            Level::Critical => "critical",
            Level::Error => "error",
            Level::Warning => "warning",
            Level::Notice => "notice",
            Level::Informational => "informational",
            Level::Debug => "debug",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<i64> for Level {
    type Error = CoreError;

    fn try_from(code: i64) -> Result<Self, CoreError> {
        Level::ALL
            .into_iter()
            .find(|level| level.code() == code)
            .ok_or_else(|| CoreError::UnknownLevel(code.to_string()))
    }
}

impl FromStr for Level {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "alert" => Ok(Level::Alert),
            "critical" | "crit" => Ok(Level::Critical),
            "error" | "err" => Ok(Level::Error),
            "warning" | "warn" => Ok(Level::Warning),
            "notice" => Ok(Level::Notice),
            "informational" | "info" => Ok(Level::Informational),
            "debug" => Ok(Level::Debug),
            other => Err(CoreError::UnknownLevel(other.to_string())),
        }
    }
}
