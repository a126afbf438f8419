//! Log input error types.

use logship_delivery::DeliveryError;
use thiserror::Error;

/// Log input error type.
#[derive(Error, Debug)]
pub enum InputError {
    /// `id` and `_id` are reserved by the collector
    #[error("Reserved field name: {0}")]
    ReservedField(String),

    /// Field name is empty after normalization
    #[error("Invalid field name: {0:?}")]
    InvalidFieldName(String),

    /// A field value could not be converted to JSON
    #[error("Field {key} could not be serialized: {message}")]
    FieldConversion { key: String, message: String },

    /// Serialization produced no bytes
    #[error("Payload serialized to an empty document")]
    EmptyPayload,

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The gate could neither deliver nor cache the payload
    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),
}

/// Result type alias using InputError.
pub type InputResult<T> = Result<T, InputError>;
