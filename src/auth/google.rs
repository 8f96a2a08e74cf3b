//! Google service account federation
//!
//! The service account key signs a JWT assertion that Google's token
//! endpoint exchanges for an ID token whose audience is the Databricks
//! host. The accounts API additionally wants a Google access token for the
//! same service account.

use super::chain::{normalize_host, Authenticator};
use super::profile::expand_home;
use super::signer::{TokenSigner, TokenSource};
use super::types::{CachedToken, Signer, TokenResponse};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::types::{non_empty, AuthKind};
use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

/// Header carrying the Google access token on the accounts API
pub const ACCESS_TOKEN_HEADER: &str = "X-Databricks-GCP-SA-Access-Token";

const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const ASSERTION_LIFETIME_SECONDS: i64 = 3600;

/// Which API surface a Google authenticator serves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoogleSurface {
    /// `accounts.*` hosts
    Accounts,
    /// Workspace hosts
    Workspace,
}

/// Whether a host serves the accounts API
pub fn is_accounts_host(host: &str) -> bool {
    let host = host
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    host.starts_with("accounts.")
}

/// Google service account authentication for one API surface
pub struct GoogleAuth {
    http: Client,
    surface: GoogleSurface,
}

impl GoogleAuth {
    pub fn new(http: Client, surface: GoogleSurface) -> Self {
        Self { http, surface }
    }
}

#[async_trait]
impl Authenticator for GoogleAuth {
    fn name(&self) -> &'static str {
        match self.surface {
            GoogleSurface::Accounts => "google-accounts",
            GoogleSurface::Workspace => "google-workspace",
        }
    }

    async fn resolve(&self, config: &mut ClientConfig) -> Result<Option<Signer>> {
        let Some(service_account) = non_empty(&config.google.service_account) else {
            return Ok(None);
        };
        let host = non_empty(&config.host).unwrap_or_default();
        let accounts = is_accounts_host(host) || non_empty(&config.account_id).is_some();
        if accounts != (self.surface == GoogleSurface::Accounts) {
            return Ok(None);
        }
        if host.is_empty() {
            return Err(Error::config(
                "host is empty, but is required by google_service_account",
            ));
        }
        let credentials = non_empty(&config.google.credentials)
            .ok_or_else(|| Error::missing_field("google_credentials"))?;

        let key = ServiceAccountKey::load(credentials).await?;
        if key.client_email != service_account {
            return Err(Error::config(format!(
                "google_credentials belong to {}, not to {service_account}",
                key.client_email
            )));
        }

        let source = GoogleTokenSource {
            http: self.http.clone(),
            key,
            audience: normalize_host(host),
            with_access_token: self.surface == GoogleSurface::Accounts,
        };
        let token = source.fetch().await?;
        info!(
            "Using Google service account {service_account} for the {} API",
            match self.surface {
                GoogleSurface::Accounts => "accounts",
                GoogleSurface::Workspace => "workspace",
            }
        );

        let kind = match self.surface {
            GoogleSurface::Accounts => AuthKind::GoogleAccounts,
            GoogleSurface::Workspace => AuthKind::GoogleWorkspace,
        };
        Ok(Some(Signer::new(kind, TokenSigner::new(source, token))))
    }
}

/// The parts of a service account key file we use
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    /// Service account email
    pub client_email: String,
    /// PEM encoded RSA private key
    pub private_key: String,
    /// OAuth token endpoint
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"***")
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

impl ServiceAccountKey {
    /// Load a key from inline JSON or from a file path
    pub async fn load(credentials: &str) -> Result<Self> {
        let trimmed = credentials.trim_start();
        if trimmed.starts_with('{') {
            return Ok(serde_json::from_str(trimmed)?);
        }
        let path = expand_home(credentials)?;
        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            Error::config(format!(
                "cannot read google_credentials {}: {e}",
                path.display()
            ))
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    fn token_uri(&self) -> &str {
        self.token_uri
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_TOKEN_URI)
    }
}

/// JWT claims structure
#[derive(Debug, Serialize)]
struct JwtClaims {
    iss: String,
    sub: String,
    aud: String,
    iat: i64,
    exp: i64,
    #[serde(flatten)]
    extra: HashMap<String, String>,
}

struct GoogleTokenSource {
    http: Client,
    key: ServiceAccountKey,
    audience: String,
    with_access_token: bool,
}

impl GoogleTokenSource {
    fn assertion(&self, claim: &str, value: &str) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = JwtClaims {
            iss: self.key.client_email.clone(),
            sub: self.key.client_email.clone(),
            aud: self.key.token_uri().to_string(),
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECONDS,
            extra: HashMap::from([(claim.to_string(), value.to_string())]),
        };

        let encoding_key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .map_err(|e| Error::JwtGeneration {
                message: format!("Invalid private key: {e}"),
            })?;

        encode(&Header::new(Algorithm::RS256), &claims, &encoding_key).map_err(|e| {
            Error::JwtGeneration {
                message: format!("Failed to encode JWT: {e}"),
            }
        })
    }

    async fn exchange(&self, assertion: &str) -> Result<TokenResponse> {
        let form = [("grant_type", JWT_BEARER_GRANT), ("assertion", assertion)];

        let response = self
            .http
            .post(self.key.token_uri())
            .form(&form)
            .send()
            .await
            .map_err(Error::Http)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::JwtGeneration {
                message: format!("JWT token exchange failed with status {status}: {body}"),
            });
        }

        response.json().await.map_err(Error::Http)
    }
}

#[async_trait]
impl TokenSource for GoogleTokenSource {
    async fn fetch(&self) -> Result<CachedToken> {
        let id_assertion = self.assertion("target_audience", &self.audience)?;
        let id_response = self.exchange(&id_assertion).await?;
        let id_token = id_response
            .id_token
            .ok_or_else(|| Error::oauth2("Google token response has no id_token"))?;
        let mut token = CachedToken::expires_in(
            id_token,
            id_response.expires_in.unwrap_or(ASSERTION_LIFETIME_SECONDS),
        );

        if self.with_access_token {
            let access_assertion = self.assertion("scope", CLOUD_PLATFORM_SCOPE)?;
            let access = self
                .exchange(&access_assertion)
                .await?
                .into_cached_token()
                .ok_or_else(|| Error::oauth2("Google token response has no access_token"))?;
            // Refresh both together, whichever expires first
            if let (Some(access_exp), Some(id_exp)) = (access.expires_at, token.expires_at) {
                token.expires_at = Some(access_exp.min(id_exp));
            }
            token = token.with_header(ACCESS_TOKEN_HEADER, access.token);
        }

        Ok(token)
    }
}
