//! Core types, configuration, and utilities for logship.
//!
//! - [`Destination`] and [`TransportKind`] describe a remote collector input.
//! - [`Level`] is the syslog severity used by payloads and destination filters.
//! - [`ShipperConfig`] and [`Paths`] locate and load runtime settings.
//! - [`init_logging`] installs the `tracing` subscriber.

mod config;
mod destination;
mod error;
mod level;
mod logging;
mod paths;

pub use config::{CacheBackend, ShipperConfig, DEFAULT_FLUSH_INTERVAL_SECS, DEFAULT_LOG_LEVEL};
pub use destination::{Destination, TransportKind};
pub use error::{CoreError, CoreResult};
pub use level::Level;
pub use logging::{init_logging, init_logging_with_file, LogFileWriter};
pub use paths::Paths;
