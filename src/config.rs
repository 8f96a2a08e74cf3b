//! Client configuration
//!
//! `ClientConfig` collects every way a caller can tell the client who it
//! is. Several sources may be filled in at once; the auth chain decides
//! which one wins.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Default requests per second admitted by the rate limiter
pub const DEFAULT_RATE_LIMIT_PER_SECOND: u32 = 15;

/// Default timeout of a single HTTP attempt
pub const DEFAULT_HTTP_TIMEOUT_SECONDS: u64 = 60;

/// Default number of body bytes written to debug logs
pub const DEFAULT_TRUNCATE_BYTES: usize = 96;

/// Default location of the profile file
pub const DEFAULT_CONFIG_FILE: &str = "~/.databrickscfg";

/// Profile used when none is named
pub const DEFAULT_PROFILE: &str = "DEFAULT";

/// Default Azure AD login endpoint (public cloud)
pub const DEFAULT_AZURE_LOGIN_ENDPOINT: &str = "https://login.microsoftonline.com";

// ============================================================================
// Client Config
// ============================================================================

/// Everything the client may be configured with
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Workspace or accounts host, with or without scheme
    pub host: Option<String>,
    /// Personal access token
    pub token: Option<String>,
    /// Username for basic auth
    pub username: Option<String>,
    /// Password for basic auth, cleared once encoded
    pub password: Option<String>,
    /// Profile name inside the profile file
    pub profile: Option<String>,
    /// Path of the profile file (`~` is expanded)
    pub config_file: Option<String>,
    /// Account id for the accounts API
    pub account_id: Option<String>,
    /// Azure identity settings
    pub azure: AzureConfig,
    /// Google identity settings
    pub google: GoogleConfig,
    /// Skip TLS certificate verification
    pub insecure_skip_verify: bool,
    /// Timeout of a single HTTP attempt, in seconds
    pub http_timeout_seconds: u64,
    /// Maximum outbound requests per second
    pub rate_limit_per_second: u32,
    /// Number of body bytes written to debug logs
    pub debug_truncate_bytes: usize,
    /// Log request and response headers at debug level
    pub debug_headers: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: None,
            token: None,
            username: None,
            password: None,
            profile: None,
            config_file: None,
            account_id: None,
            azure: AzureConfig::default(),
            google: GoogleConfig::default(),
            insecure_skip_verify: false,
            http_timeout_seconds: DEFAULT_HTTP_TIMEOUT_SECONDS,
            rate_limit_per_second: DEFAULT_RATE_LIMIT_PER_SECOND,
            debug_truncate_bytes: DEFAULT_TRUNCATE_BYTES,
            debug_headers: false,
        }
    }
}

impl ClientConfig {
    /// Create a new config builder
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Load a config from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("cannot read config file {}: {e}", path.display()))
        })?;
        Self::from_json_str(&content)
    }

    /// Parse a config from a JSON string
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Per-attempt timeout, zero falls back to the default
    pub fn http_timeout(&self) -> Duration {
        let secs = if self.http_timeout_seconds == 0 {
            DEFAULT_HTTP_TIMEOUT_SECONDS
        } else {
            self.http_timeout_seconds
        };
        Duration::from_secs(secs)
    }

    /// Requests per second, zero falls back to the default
    pub fn rate_limit(&self) -> u32 {
        if self.rate_limit_per_second == 0 {
            DEFAULT_RATE_LIMIT_PER_SECOND
        } else {
            self.rate_limit_per_second
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("host", &self.host)
            .field("token", &redact(&self.token))
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("profile", &self.profile)
            .field("config_file", &self.config_file)
            .field("account_id", &self.account_id)
            .field("azure", &self.azure)
            .field("google", &self.google)
            .field("insecure_skip_verify", &self.insecure_skip_verify)
            .field("http_timeout_seconds", &self.http_timeout_seconds)
            .field("rate_limit_per_second", &self.rate_limit_per_second)
            .finish_non_exhaustive()
    }
}

fn redact(value: &Option<String>) -> Option<&'static str> {
    value.as_ref().map(|_| "***")
}

// ============================================================================
// Cloud identity settings
// ============================================================================

/// Azure AD settings
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AzureConfig {
    /// Full ARM resource id of the workspace
    pub resource_id: Option<String>,
    /// Service principal application id
    pub client_id: Option<String>,
    /// Service principal secret
    pub client_secret: Option<String>,
    /// Directory (tenant) id
    pub tenant_id: Option<String>,
    /// Login endpoint override, for sovereign clouds and tests
    pub login_endpoint: Option<String>,
}

impl AzureConfig {
    /// Login endpoint, without trailing slash
    pub fn login_endpoint(&self) -> String {
        self.login_endpoint
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_AZURE_LOGIN_ENDPOINT)
            .trim_end_matches('/')
            .to_string()
    }
}

impl fmt::Debug for AzureConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureConfig")
            .field("resource_id", &self.resource_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &redact(&self.client_secret))
            .field("tenant_id", &self.tenant_id)
            .field("login_endpoint", &self.login_endpoint)
            .finish()
    }
}

/// Google service account settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleConfig {
    /// Service account email
    pub service_account: Option<String>,
    /// Service account key, either a file path or the JSON itself
    pub credentials: Option<String>,
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`ClientConfig`]
#[derive(Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set the host
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = Some(host.into());
        self
    }

    /// Set the personal access token
    #[must_use]
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.config.token = Some(token.into());
        self
    }

    /// Set basic auth credentials
    #[must_use]
    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.username = Some(username.into());
        self.config.password = Some(password.into());
        self
    }

    /// Set the profile name
    #[must_use]
    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.config.profile = Some(profile.into());
        self
    }

    /// Set the profile file path
    #[must_use]
    pub fn config_file(mut self, path: impl Into<String>) -> Self {
        self.config.config_file = Some(path.into());
        self
    }

    /// Set the account id
    #[must_use]
    pub fn account_id(mut self, account_id: impl Into<String>) -> Self {
        self.config.account_id = Some(account_id.into());
        self
    }

    /// Set Azure settings
    #[must_use]
    pub fn azure(mut self, azure: AzureConfig) -> Self {
        self.config.azure = azure;
        self
    }

    /// Set Google settings
    #[must_use]
    pub fn google(mut self, google: GoogleConfig) -> Self {
        self.config.google = google;
        self
    }

    /// Skip TLS verification
    #[must_use]
    pub fn insecure_skip_verify(mut self, skip: bool) -> Self {
        self.config.insecure_skip_verify = skip;
        self
    }

    /// Set the per-attempt timeout
    #[must_use]
    pub fn http_timeout_seconds(mut self, seconds: u64) -> Self {
        self.config.http_timeout_seconds = seconds;
        self
    }

    /// Set the rate limit
    #[must_use]
    pub fn rate_limit_per_second(mut self, rps: u32) -> Self {
        self.config.rate_limit_per_second = rps;
        self
    }

    /// Set debug logging options
    #[must_use]
    pub fn debug(mut self, truncate_bytes: usize, headers: bool) -> Self {
        self.config.debug_truncate_bytes = truncate_bytes;
        self.config.debug_headers = headers;
        self
    }

    /// Build the config
    pub fn build(self) -> ClientConfig {
        self.config
    }
}
