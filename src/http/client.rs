//! HTTP transport
//!
//! `Transport` is the seam every outbound call goes through. The default
//! implementation wraps a reqwest client tuned for control-plane calls;
//! decorators such as `RetryTransport` wrap any other transport.

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Client, Request, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Idle keep-alive timeout of a generic HTTP client
pub const BASE_IDLE_CONN_TIMEOUT: Duration = Duration::from_secs(90);

/// TLS handshake timeout of a generic HTTP client
pub const BASE_TLS_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Factor applied to the generic timeouts above.
///
/// Calls made right after cloud federation often hit cold workspaces.
pub const CONNECTION_TIMEOUT_FACTOR: u32 = 3;

/// Configuration for the HTTP transport
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Timeout of a single attempt
    pub timeout: Duration,
    /// How long idle pooled connections are kept
    pub pool_idle_timeout: Duration,
    /// Connect plus TLS handshake timeout
    pub connect_timeout: Duration,
    /// Skip TLS certificate verification
    pub insecure_skip_verify: bool,
    /// User agent string
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(crate::config::DEFAULT_HTTP_TIMEOUT_SECONDS),
            pool_idle_timeout: BASE_IDLE_CONN_TIMEOUT * CONNECTION_TIMEOUT_FACTOR,
            connect_timeout: BASE_TLS_HANDSHAKE_TIMEOUT * CONNECTION_TIMEOUT_FACTOR,
            insecure_skip_verify: false,
            user_agent: format!("dbx-client/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl TransportConfig {
    /// Derive transport settings from the client config
    pub fn from_client_config(config: &ClientConfig) -> Self {
        Self {
            timeout: config.http_timeout(),
            insecure_skip_verify: config.insecure_skip_verify,
            ..Self::default()
        }
    }

    /// Build a reqwest client with these settings
    pub fn build_client(&self) -> Result<Client> {
        Client::builder()
            .timeout(self.timeout)
            .pool_idle_timeout(self.pool_idle_timeout)
            .connect_timeout(self.connect_timeout)
            .danger_accept_invalid_certs(self.insecure_skip_verify)
            .user_agent(&self.user_agent)
            .build()
            .map_err(Error::Http)
    }
}

/// A fully read HTTP response
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// Response status
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Response body
    pub body: Vec<u8>,
}

impl RawResponse {
    /// Create a response with no headers
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Body as lossy UTF-8
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Sends a request and reads the whole response
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute one request.
    ///
    /// Non-2xx responses are returned as `Ok`; only failures to get a
    /// response at all are errors.
    async fn execute(&self, request: Request) -> Result<RawResponse>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn execute(&self, request: Request) -> Result<RawResponse> {
        (**self).execute(request).await
    }
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    timeout: Duration,
}

impl HttpTransport {
    /// Create a transport with the given config
    pub fn new(config: &TransportConfig) -> Result<Self> {
        Ok(Self {
            client: config.build_client()?,
            timeout: config.timeout,
        })
    }

    /// Get the underlying reqwest client
    pub fn inner(&self) -> &Client {
        &self.client
    }

    fn map_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else {
            Error::Http(e)
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: Request) -> Result<RawResponse> {
        let method = request.method().clone();
        let url = request.url().clone();

        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| self.map_error(e))?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(|e| self.map_error(e))?;

        debug!("{method} {url} -> {}", status.as_u16());
        Ok(RawResponse {
            status,
            headers,
            body: body.to_vec(),
        })
    }
}
