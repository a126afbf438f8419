//! Cache-and-retry delivery of log payloads.
//!
//! This crate provides:
//! - [`DeliveryGate`]: forwards payloads to a [`Transport`], caching failures
//!   in a [`logship_cache::CacheStore`] and draining them on a timer
//! - [`RecoveryTimer`]: idempotent repeating trigger behind the gate's flushes
//! - [`HttpTransport`], [`UdpTransport`] and [`KindRouter`]: transport adapters

mod error;
mod gate;
mod http;
mod timer;
mod transport;
mod udp;

pub use error::{DeliveryError, DeliveryResult, Outcome, TransportError};
pub use gate::{DeliveryGate, FlushReport, FlushSkip, GateConfig};
pub use http::{HttpTransport, DEFAULT_HTTP_TIMEOUT};
pub use timer::{RecoveryTimer, TimerLock};
pub use transport::{KindRouter, Reachability, Transport, TransportResponse};
pub use udp::{UdpTransport, MAX_DATAGRAM_SIZE};
