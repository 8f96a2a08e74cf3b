//! Request signers
//!
//! Static credentials become a precomputed header. Federated credentials
//! are short-lived, so their signer keeps a cached token and refreshes it
//! from a `TokenSource` when it expires.

use super::types::CachedToken;
use crate::error::{Error, Result};
use async_trait::async_trait;
use base64::Engine as _;
use reqwest::header::{HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::Request;
use tokio::sync::RwLock;
use tracing::debug;

/// Capability to add proof of identity to an outgoing request
#[async_trait]
pub trait SignRequest: Send + Sync {
    /// Mutate the request in place
    async fn sign(&self, request: &mut Request) -> Result<()>;
}

/// Source of short-lived tokens for a federated signer
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Obtain a fresh token
    async fn fetch(&self) -> Result<CachedToken>;
}

/// Encode basic auth credentials as used in the `Authorization` header
pub fn encode_basic_auth(username: &str, password: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"))
}

fn header_name(name: &str) -> Result<HeaderName> {
    HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| Error::auth(format!("invalid header name {name}: {e}")))
}

fn sensitive_value(value: &str) -> Result<HeaderValue> {
    let mut value = HeaderValue::from_str(value)
        .map_err(|e| Error::auth(format!("credential is not a valid header value: {e}")))?;
    value.set_sensitive(true);
    Ok(value)
}

// ============================================================================
// Static header signer
// ============================================================================

/// Signs requests with fixed headers
#[derive(Debug, Clone)]
pub struct HeaderSigner {
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl HeaderSigner {
    /// `Authorization: <scheme> <credential>`
    pub fn authorization(scheme: &str, credential: &str) -> Result<Self> {
        Ok(Self {
            headers: vec![(AUTHORIZATION, sensitive_value(&format!("{scheme} {credential}"))?)],
        })
    }

    /// Add another fixed header
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        self.headers.push((header_name(name)?, sensitive_value(value)?));
        Ok(self)
    }
}

#[async_trait]
impl SignRequest for HeaderSigner {
    async fn sign(&self, request: &mut Request) -> Result<()> {
        let headers = request.headers_mut();
        for (name, value) in &self.headers {
            headers.insert(name.clone(), value.clone());
        }
        Ok(())
    }
}

// ============================================================================
// Refreshing token signer
// ============================================================================

/// Signs requests with a bearer token that is refreshed on expiry
pub struct TokenSigner<S> {
    source: S,
    cached_token: RwLock<Option<CachedToken>>,
    static_headers: Vec<(HeaderName, HeaderValue)>,
}

impl<S: TokenSource> TokenSigner<S> {
    /// Create a signer seeded with the token obtained during resolution
    pub fn new(source: S, initial: CachedToken) -> Self {
        Self {
            source,
            cached_token: RwLock::new(Some(initial)),
            static_headers: Vec::new(),
        }
    }

    /// Add a header sent with every request regardless of token
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        self.static_headers
            .push((header_name(name)?, sensitive_value(value)?));
        Ok(self)
    }

    /// Get a valid token, refreshing if necessary
    async fn get_or_refresh_token(&self) -> Result<CachedToken> {
        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                if !token.is_expired() {
                    return Ok(token.clone());
                }
            }
        }

        let mut cached = self.cached_token.write().await;

        // Another task may have refreshed while we waited for the write lock
        if let Some(token) = cached.as_ref() {
            if !token.is_expired() {
                return Ok(token.clone());
            }
        }

        debug!("Refreshing expired federated token");
        let new_token = self.source.fetch().await?;
        *cached = Some(new_token.clone());

        Ok(new_token)
    }
}

#[async_trait]
impl<S: TokenSource> SignRequest for TokenSigner<S> {
    async fn sign(&self, request: &mut Request) -> Result<()> {
        let token = self.get_or_refresh_token().await?;
        let headers = request.headers_mut();
        headers.insert(
            AUTHORIZATION,
            sensitive_value(&format!("Bearer {}", token.token))?,
        );
        for (name, value) in &token.extra_headers {
            headers.insert(header_name(name)?, sensitive_value(value)?);
        }
        for (name, value) in &self.static_headers {
            headers.insert(name.clone(), value.clone());
        }
        Ok(())
    }
}
