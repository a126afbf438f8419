//! GELF log input.
//!
//! Turns [`LogEvent`]s into GELF 1.1 payloads and hands them to a
//! [`logship_delivery::DeliveryGate`].

mod error;
mod event;
mod input;
mod payload;

pub use error::{InputError, InputResult};
pub use event::{default_hostname, LogEvent};
pub use input::{LogDisposition, LogInput, ERROR_REPORT_MESSAGE};
pub use payload::{build_payload, serialize_payload, PayloadOptions, GELF_VERSION, MAX_FIELD_CHARS};
