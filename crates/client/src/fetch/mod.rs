//! Network transport for intercepted requests.
//!
//! ### Transport seam
//! - [`Transport`] sends one request and reports either a response (any
//!   status) or a transport-level failure. Status interpretation belongs to
//!   the caller: a 4xx/5xx is an application answer, not a connectivity loss.
//! - [`HttpTransport`] is the reqwest implementation.
//!
//! ### URL resolution
//! - Relative request URLs resolve against the backend origin.
//! - Fragments are dropped so they never split cache identities.

pub mod url;

#[cfg(test)]
pub(crate) mod mock;

use bytes::Bytes;
use reqwest::{Client, Method, header};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub use self::url::{UrlError, resolve};

use courier_core::Error;

/// Configuration for the HTTP transport.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "courier/0.1")
    pub user_agent: String,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { user_agent: "courier/0.1".to_string(), timeout: Duration::from_millis(20000), max_redirects: 5 }
    }
}

/// A request on its way to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    pub method: String,
    pub url: ::url::Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

/// Response from the backend, whatever its status.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers, lowercased names
    pub headers: Vec<(String, String)>,
    /// Response body bytes
    pub body: Bytes,
    /// Time taken to fetch in milliseconds
    pub fetch_ms: u64,
}

impl FetchResponse {
    /// Whether the backend acknowledged the request (2xx).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First value of a header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Transport-level failures. The backend was never heard from.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// Request timeout.
    #[error("request timeout")]
    Timeout,

    /// Network error (connect, DNS, reset, body read).
    #[error("network error: {0}")]
    Network(Arc<reqwest::Error>),

    /// Non-reqwest transports report failures as text.
    #[error("transport unavailable: {0}")]
    Unavailable(String),

    /// The request could not be built (bad method or header). Never sent.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The backend answered with a status but the body was cut off.
    #[error("response body incomplete after status {status}: {reason}")]
    Incomplete { status: u16, headers: Vec<(String, String)>, reason: String },
}

impl TransportError {
    /// Whether the backend acknowledged the request (2xx) before the failure.
    pub fn is_acknowledged(&self) -> bool {
        matches!(self, TransportError::Incomplete { status, .. } if (200..300).contains(status))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_builder() {
            TransportError::InvalidRequest(err.to_string())
        } else {
            TransportError::Network(Arc::new(err))
        }
    }
}

impl From<TransportError> for Error {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout => Error::Timeout("request timeout".into()),
            TransportError::InvalidRequest(msg) => Error::InvalidInput(msg),
            other => Error::Transport(other.to_string()),
        }
    }
}

/// Sends requests to the network.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Send one request. Any HTTP status is `Ok`.
    async fn send(&self, request: &OutboundRequest) -> Result<FetchResponse, TransportError>;
}

/// reqwest-backed transport.
pub struct HttpTransport {
    http: Client,
}

impl HttpTransport {
    /// Create a new transport with the given configuration.
    pub fn new(config: &FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::InvalidInput(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http })
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &OutboundRequest) -> Result<FetchResponse, TransportError> {
        let start = Instant::now();
        let method = Method::from_bytes(request.method.to_ascii_uppercase().as_bytes())
            .map_err(|e| TransportError::InvalidRequest(format!("invalid method {}: {e}", request.method)))?;

        let mut builder = self.http.request(method, request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(method = %request.method, url = %request.url, status, error = %e, "response body read failed");
                return Err(TransportError::Incomplete { status, headers, reason: e.to_string() });
            }
        };
        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(
            method = %request.method,
            url = %request.url,
            status,
            bytes = body.len(),
            fetch_ms,
            "fetched"
        );

        Ok(FetchResponse { status, headers, body, fetch_ms })
    }
}

/// Content type from a header list.
pub(crate) fn content_type_of(headers: &[(String, String)]) -> Option<String> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(header::CONTENT_TYPE.as_str()))
        .map(|(_, v)| v.clone())
}
