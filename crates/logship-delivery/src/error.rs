//! Delivery error types.

use logship_cache::StoreError;
use logship_core::TransportKind;
use thiserror::Error;

/// Failure reported by a transport for a single submission.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The collector could not be reached
    #[error("Destination unreachable: {0}")]
    Unreachable(String),

    /// The collector answered with a non-success status
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// The request could not be built or completed
    #[error("Request failed: {0}")]
    Request(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No adapter handles this transport kind
    #[error("Unsupported transport kind: {0}")]
    Unsupported(TransportKind),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() {
            TransportError::Unreachable(e.to_string())
        } else {
            TransportError::Request(e.to_string())
        }
    }
}

/// Delivery gate error type.
#[derive(Error, Debug)]
pub enum DeliveryError {
    /// Delivery failed but the payload is safe in the cache.
    #[error("Delivery failed, payload cached for retry: {source}")]
    CachedAfterError { source: TransportError },

    /// The cache store itself failed; the payload was not kept.
    #[error("Cache store error: {0}")]
    Store(#[from] StoreError),

    /// The gate was created outside a Tokio runtime
    #[error("No Tokio runtime available")]
    NoRuntime,

    /// The recovery timer period must be non-zero
    #[error("Flush interval must be greater than zero")]
    ZeroFlushInterval,
}

impl DeliveryError {
    /// True when the payload was queued for retry.
    pub fn is_cached(&self) -> bool {
        matches!(self, DeliveryError::CachedAfterError { .. })
    }
}

/// Result type alias using DeliveryError.
pub type DeliveryResult<T> = Result<T, DeliveryError>;

/// Three-way classification of a submission result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Delivered,
    Queued,
    Unrecoverable,
}

impl Outcome {
    pub fn of<T>(result: &DeliveryResult<T>) -> Self {
        match result {
            Ok(_) => Outcome::Delivered,
            Err(e) if e.is_cached() => Outcome::Queued,
            Err(_) => Outcome::Unrecoverable,
        }
    }
}
