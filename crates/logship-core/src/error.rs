//! Core error types for logship.

use thiserror::Error;

/// Core error type for configuration and value parsing.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Path error (e.g., home directory not found)
    #[error("Path error: {0}")]
    Path(String),

    /// Unknown transport kind name
    #[error("Unknown transport kind: {0}")]
    UnknownTransportKind(String),

    /// Unknown severity level name or code
    #[error("Unknown level: {0}")]
    UnknownLevel(String),
}

/// Result type alias using CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
