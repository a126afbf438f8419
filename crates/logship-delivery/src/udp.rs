//! UDP transport sending each payload as a single GELF datagram.

use crate::{Transport, TransportError, TransportResponse};
use async_trait::async_trait;
use logship_core::{Destination, TransportKind};
use tokio::net::{lookup_host, UdpSocket};
use tracing::debug;

/// Largest payload sent as one datagram. Chunked GELF is not supported.
pub const MAX_DATAGRAM_SIZE: usize = 8192;

#[derive(Debug, Clone, Copy, Default)]
pub struct UdpTransport;

impl UdpTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn submit(
        &self,
        destination: &Destination,
        payload: &[u8],
    ) -> Result<TransportResponse, TransportError> {
        if destination.kind() != TransportKind::Udp {
            return Err(TransportError::Unsupported(destination.kind()));
        }
        if payload.len() > MAX_DATAGRAM_SIZE {
            return Err(TransportError::Request(format!(
                "payload of {} bytes exceeds datagram limit of {MAX_DATAGRAM_SIZE}",
                payload.len()
            )));
        }

        let target = lookup_host(destination.authority())
            .await
            .map_err(|e| TransportError::Unreachable(format!("{}: {e}", destination.authority())))?
            .next()
            .ok_or_else(|| {
                TransportError::Unreachable(format!("{}: no address", destination.authority()))
            })?;

        let bind_addr = if target.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind_addr).await?;
        let sent = socket.send_to(payload, target).await?;
        debug!(target = %target, bytes = sent, "Sent log datagram");

        Ok(TransportResponse::sent())
    }
}
