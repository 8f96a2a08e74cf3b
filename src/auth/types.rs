//! Auth value types
//!
//! `Signer` is what a successful authenticator hands back; `CachedToken`
//! is the short-lived credential federated signers keep refreshed.

use super::signer::SignRequest;
use crate::error::Result;
use crate::types::AuthKind;
use chrono::{DateTime, Utc};
use reqwest::Request;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;

/// A resolved request-signing capability
#[derive(Clone)]
pub struct Signer {
    kind: AuthKind,
    inner: Arc<dyn SignRequest>,
}

impl Signer {
    /// Wrap a signing implementation
    pub fn new(kind: AuthKind, inner: impl SignRequest + 'static) -> Self {
        Self {
            kind,
            inner: Arc::new(inner),
        }
    }

    /// The authentication kind this signer applies
    pub fn kind(&self) -> AuthKind {
        self.kind
    }

    /// Add proof of identity to an outgoing request
    pub async fn sign(&self, request: &mut Request) -> Result<()> {
        self.inner.sign(request).await
    }

    /// Whether two signers share the same underlying instance
    pub fn ptr_eq(&self, other: &Signer) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Cached token with expiration
#[derive(Clone)]
pub struct CachedToken {
    /// The access token
    pub token: String,
    /// When the token expires
    pub expires_at: Option<DateTime<Utc>>,
    /// Headers sent alongside the token
    pub extra_headers: Vec<(String, String)>,
}

impl CachedToken {
    /// Create a new cached token
    pub fn new(token: String, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            token,
            expires_at,
            extra_headers: Vec::new(),
        }
    }

    /// Create a token that expires in N seconds from now
    pub fn expires_in(token: String, seconds: i64) -> Self {
        let expires_at = Utc::now() + chrono::Duration::seconds(seconds);
        Self::new(token, Some(expires_at))
    }

    /// Attach a header that travels with this token
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.push((name.into(), value.into()));
        self
    }

    /// Check if the token is expired (with 30 second buffer)
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => {
                let buffer = chrono::Duration::seconds(30);
                Utc::now() + buffer >= expires_at
            }
            None => false, // No expiration = never expires
        }
    }
}

impl fmt::Debug for CachedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedToken")
            .field("token", &"***")
            .field("expires_at", &self.expires_at)
            .field("extra_headers", &self.extra_headers.len())
            .finish()
    }
}

/// OAuth2 token endpoint response
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

impl TokenResponse {
    pub fn into_cached_token(self) -> Option<CachedToken> {
        let token = self.access_token?;
        Some(match self.expires_in {
            Some(secs) => CachedToken::expires_in(token, secs),
            None => CachedToken::new(token, None),
        })
    }
}
