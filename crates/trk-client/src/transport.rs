//! Request delivery.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Default request timeout for tracking calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Failed to build HTTP client.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    /// HTTP request failed before a status was received.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Sends one request and reports the response status.
///
/// The client never has more than one call in flight per queue. Timeouts and
/// cancellation are the transport's business.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, url: &str) -> Result<u16, TransportError>;
}

/// [`Transport`] issuing plain GET requests with `reqwest`.
///
/// # Thread Safety
///
/// The transport is safe to share across threads. Clones share the underlying
/// HTTP connection pool.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    /// Creates a transport whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(TransportError::ClientBuild)?;
        Ok(Self { http })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, url: &str) -> Result<u16, TransportError> {
        let response = self.http.get(url).send().await?;
        let status = response.status().as_u16();
        tracing::trace!(status, "tracking request completed");
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_transport_builds() {
        assert!(HttpTransport::new(DEFAULT_TIMEOUT).is_ok());
    }

    #[tokio::test]
    async fn unreachable_host_is_a_request_error() {
        let transport = HttpTransport::new(Duration::from_secs(2)).unwrap();
        let result = transport.send("http://127.0.0.1:1/e?_k=k").await;
        assert!(matches!(result, Err(TransportError::Request(_))));
    }
}
