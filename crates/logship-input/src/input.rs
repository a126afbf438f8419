//! A configured GELF input.

use crate::{build_payload, serialize_payload, InputError, InputResult, LogEvent, PayloadOptions};
use logship_core::{Destination, Level};
use logship_delivery::{DeliveryGate, Transport};
use std::fmt::Display;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Short message of the event sent when logging itself fails.
pub const ERROR_REPORT_MESSAGE: &str = "Logging failed with error";

/// What happened to a logged event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogDisposition {
    /// Less severe than the input accepts; nothing was sent.
    Filtered,
    Delivered,
    /// Delivery failed and the payload was cached for retry.
    Queued,
}

/// Sends events to one destination through a delivery gate.
pub struct LogInput {
    destination: Destination,
    gate: Arc<DeliveryGate>,
    options: PayloadOptions,
}

impl LogInput {
    /// Events less severe than the destination's filter are dropped. A
    /// destination without one is filtered at [`Level::Informational`].
    pub fn new(destination: Destination, gate: Arc<DeliveryGate>) -> Self {
        let destination = match destination.max_level() {
            Some(_) => destination,
            None => destination.with_max_level(Level::Informational),
        };
        Self {
            destination,
            gate,
            options: PayloadOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PayloadOptions) -> Self {
        self.options = options;
        self
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    pub fn max_level(&self) -> Level {
        self.destination.max_level().unwrap_or(Level::Informational)
    }

    /// Build, serialize and submit `event`.
    ///
    /// Events that cannot be serialized are not cached. An error report
    /// event is sent straight to the transport instead, and the error is
    /// returned. The same happens when the gate can neither deliver nor
    /// cache the payload.
    pub async fn log(&self, event: LogEvent) -> InputResult<LogDisposition> {
        if !self.destination.accepts(event.level()) {
            debug!(level = %event.level(), max_level = %self.max_level(), "Event filtered by level");
            return Ok(LogDisposition::Filtered);
        }

        let payload = match build_payload(&event, &self.options).and_then(|map| serialize_payload(&map)) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Failed to serialize log event");
                self.report_error(&event, &e).await;
                return Err(e);
            }
        };

        match self.gate.submit(&self.destination, &payload).await {
            Ok(_) => Ok(LogDisposition::Delivered),
            Err(e) if e.is_cached() => Ok(LogDisposition::Queued),
            Err(e) => {
                self.report_error(&event, &e).await;
                Err(InputError::Delivery(e))
            }
        }
    }

    /// Best-effort diagnostic event that bypasses the cache.
    async fn report_error(&self, event: &LogEvent, cause: &dyn Display) {
        let mut report = LogEvent::new(ERROR_REPORT_MESSAGE)
            .with_level(Level::Error)
            .with_full_message(format!("{ERROR_REPORT_MESSAGE} : {cause}"))
            .with_host(event.host())
            .with_timestamp(event.timestamp());
        if let (Some(file), Some(line)) = (event.file(), event.line()) {
            report = report.with_location(file, line);
        }

        let payload = match build_payload(&report, &self.options).and_then(|map| serialize_payload(&map)) {
            Ok(payload) => payload,
            Err(e) => {
                error!(error = %e, "Failed to serialize error report");
                return;
            }
        };

        if let Err(e) = self.gate.transport().submit(&self.destination, &payload).await {
            error!(destination = %self.destination, error = %e, "Failed to submit error report");
        }
    }
}
