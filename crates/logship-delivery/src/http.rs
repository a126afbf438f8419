//! HTTP transport posting payloads to a GELF HTTP input.

use crate::{Transport, TransportError, TransportResponse};
use async_trait::async_trait;
use logship_core::{Destination, TransportKind};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Default request timeout.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Posts each payload as a JSON body to `Destination::url()`.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, TransportError> {
        Self::with_timeout(DEFAULT_HTTP_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Request(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn submit(
        &self,
        destination: &Destination,
        payload: &[u8],
    ) -> Result<TransportResponse, TransportError> {
        if destination.kind() == TransportKind::Udp {
            return Err(TransportError::Unsupported(destination.kind()));
        }

        let url = destination.url();
        debug!(url = %url, bytes = payload.len(), "Posting log payload");

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .body(payload.to_vec())
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?.to_vec();
        if !status.is_success() {
            return Err(TransportError::HttpStatus {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        Ok(TransportResponse::http(status.as_u16(), body))
    }
}
