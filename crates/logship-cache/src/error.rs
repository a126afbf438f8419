//! Cache store error types.

use thiserror::Error;

/// Cache store error type.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Migration error
    #[error("Migration error: {0}")]
    Migration(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored row could not be decoded back into an entry
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Result type alias using StoreError.
pub type StoreResult<T> = Result<T, StoreError>;
