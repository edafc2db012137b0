//! HTTP transport seam for the job client.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Default per-request timeout for [`HttpTransport`].
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// A JSON POST to the generation service.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    /// Absolute URL.
    pub url: String,
    /// JSON body.
    pub body: Value,
}

/// Raw response as received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Body text, possibly empty.
    pub body: String,
}

impl TransportResponse {
    /// Returns true for a 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Network-layer failure (connection, DNS, TLS, timeout).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct TransportFailure(pub String);

/// Sends requests to the generation service.
///
/// Implementations must be safe to call concurrently; the job client never
/// serialises unrelated requests behind a lock of its own.
pub trait Transport: Send + Sync {
    /// Performs one request without retrying.
    fn send<'a>(
        &'a self,
        request: &'a TransportRequest,
    ) -> Pin<Box<dyn Future<Output = Result<TransportResponse, TransportFailure>> + Send + 'a>>;
}

/// [`Transport`] backed by a pooled [`reqwest::Client`].
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Creates a transport with the given per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self, TransportFailure> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportFailure(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Wraps an existing client, sharing its connection pool.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

impl Transport for HttpTransport {
    fn send<'a>(
        &'a self,
        request: &'a TransportRequest,
    ) -> Pin<Box<dyn Future<Output = Result<TransportResponse, TransportFailure>> + Send + 'a>>
    {
        Box::pin(async move {
            debug!(url = %request.url, "Sending generation service request");

            let response = self
                .client
                .post(&request.url)
                .header("content-type", "application/json")
                .json(&request.body)
                .send()
                .await
                .map_err(|e| TransportFailure(e.to_string()))?;

            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .map_err(|e| TransportFailure(format!("failed to read response body: {e}")))?;

            debug!(
                url = %request.url,
                status,
                body_len = body.len(),
                "Received generation service response"
            );

            Ok(TransportResponse { status, body })
        })
    }
}
