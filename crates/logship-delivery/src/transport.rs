//! Transport contract and kind routing.

use crate::TransportError;
use async_trait::async_trait;
use logship_core::{Destination, TransportKind};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// What a collector sent back for a delivered payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status, `None` for connectionless transports.
    pub status: Option<u16>,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn http(status: u16, body: Vec<u8>) -> Self {
        Self {
            status: Some(status),
            body,
        }
    }

    pub fn sent() -> Self {
        Self::default()
    }
}

/// Delivers one payload to one destination.
///
/// Each call resolves exactly once, with either a response or an error.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn submit(
        &self,
        destination: &Destination,
        payload: &[u8],
    ) -> Result<TransportResponse, TransportError>;

    /// Whether resubmission is worth attempting right now.
    fn is_reachable(&self) -> bool {
        true
    }
}

/// Network reachability predicate consulted before a flush.
pub trait Reachability: Send + Sync {
    fn is_reachable(&self) -> bool;
}

impl<F> Reachability for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_reachable(&self) -> bool {
        self()
    }
}

/// Routes each destination to the transport bound to its kind.
#[derive(Default, Clone)]
pub struct KindRouter {
    routes: HashMap<TransportKind, Arc<dyn Transport>>,
}

impl KindRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Router with the bundled HTTP adapter for `http`/`https` and the UDP
    /// adapter for `udp`.
    pub fn standard() -> Result<Self, TransportError> {
        let http: Arc<dyn Transport> = Arc::new(crate::HttpTransport::new()?);
        Ok(Self::new()
            .with(TransportKind::Http, Arc::clone(&http))
            .with(TransportKind::Https, http)
            .with(TransportKind::Udp, Arc::new(crate::UdpTransport::new())))
    }

    /// Bind `transport` to `kind`, returning the previous binding.
    pub fn bind(
        &mut self,
        kind: TransportKind,
        transport: Arc<dyn Transport>,
    ) -> Option<Arc<dyn Transport>> {
        let previous = self.routes.insert(kind, transport);
        if previous.is_some() {
            warn!(kind = %kind, "Replacing transport bound to kind");
        }
        previous
    }

    pub fn with(mut self, kind: TransportKind, transport: Arc<dyn Transport>) -> Self {
        self.bind(kind, transport);
        self
    }

    pub fn is_bound(&self, kind: TransportKind) -> bool {
        self.routes.contains_key(&kind)
    }
}

#[async_trait]
impl Transport for KindRouter {
    async fn submit(
        &self,
        destination: &Destination,
        payload: &[u8],
    ) -> Result<TransportResponse, TransportError> {
        let transport = self
            .routes
            .get(&destination.kind())
            .ok_or(TransportError::Unsupported(destination.kind()))?;
        transport.submit(destination, payload).await
    }

    fn is_reachable(&self) -> bool {
        self.routes.values().all(|transport| transport.is_reachable())
    }
}
