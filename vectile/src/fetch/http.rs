//! HTTP client abstraction for testability.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, trace};

/// Errors produced by a tile fetch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The server answered with a non-success status code.
    #[error("HTTP status {0}")]
    Http(u16),
    /// The request failed below the HTTP layer (DNS, TLS, connection).
    #[error("network error: {0}")]
    Network(String),
    /// The request did not complete within the configured timeout.
    #[error("request timed out")]
    Timeout,
    /// The request was cancelled before completing.
    #[error("request cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

/// Trait for asynchronous HTTP GET operations.
///
/// This abstraction allows dependency injection of the transport, so the
/// loader can be exercised in tests without a network.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Performs an HTTP GET request and returns the response body.
    ///
    /// A non-2xx status is an error; implementations must not silently
    /// return error-page bodies as tile bytes.
    async fn get(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Default request timeout for tile downloads.
pub(crate) const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// User-Agent sent with every tile request. Some tile servers reject
/// requests without one.
const USER_AGENT: &str = concat!("vectile/", env!("CARGO_PKG_VERSION"));

/// HTTP client implementation backed by reqwest.
///
/// Connections are pooled by the underlying client; the loader itself
/// performs no connection management.
#[derive(Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Creates a client with the default timeout.
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeout(DEFAULT_HTTP_TIMEOUT)
    }

    /// Creates a client with a custom request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .tcp_nodelay(true)
            .build()
            .map_err(|err| FetchError::Network(format!("failed to build client: {err}")))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        trace!(url, "HTTP GET starting");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            debug!(url, status = status.as_u16(), "HTTP error status");
            return Err(FetchError::Http(status.as_u16()));
        }

        let body = response.bytes().await?;
        trace!(url, bytes = body.len(), "HTTP response body read");
        Ok(body.to_vec())
    }
}
