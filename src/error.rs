//! Error types for dbx-client
//!
//! This module defines the error hierarchy for the whole crate.
//! All public APIs return `Result<T, Error>` where Error is defined here.

use thiserror::Error;

/// Substrings of error bodies that mark a 400 response as transient.
///
/// Freshly provisioned workspaces answer with these for a while before
/// the control plane catches up.
const TRANSIENT_ERROR_MESSAGES: &[&str] = &[
    "com.databricks.backend.manager.util.UnknownWorkerEnvironmentException",
    "does not have any associated worker environments",
    "There is no worker environment with id",
    "Unknown worker environment",
    "ClusterNotReadyException",
    "Timed out after ",
    "requests are being throttled",
];

/// The main error type for dbx-client
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required config field: {field}")]
    MissingConfigField { field: String },

    #[error("{message}")]
    NotConfigured { message: String },

    #[error("{path} has no {profile} profile configured")]
    ProfileNotFound { path: String, profile: String },

    #[error("config file {path} is corrupt: cannot find {field} in {profile} profile")]
    CorruptProfile {
        path: String,
        profile: String,
        field: String,
    },

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Authentication Errors
    // ============================================================================
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    #[error("JWT generation failed: {message}")]
    JwtGeneration { message: String },

    #[error("OAuth2 error: {message}")]
    OAuth2 { message: String },

    #[error("Command `{program}` failed: {message}")]
    Command { program: String, message: String },

    // ============================================================================
    // HTTP Errors
    // ============================================================================
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("{error_code}: {message}")]
    Api {
        status: u16,
        error_code: String,
        message: String,
    },

    #[error("Connection error: {message}")]
    Connection { message: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Failed to decode response: {message}")]
    Decode { message: String },

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingConfigField {
            field: field.into(),
        }
    }

    /// Create an auth error
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Create an OAuth2 token exchange error
    pub fn oauth2(message: impl Into<String>) -> Self {
        Self::OAuth2 {
            message: message.into(),
        }
    }

    /// Create an HTTP status error
    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            body: body.into(),
        }
    }

    /// Create a connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Build the error for a non-2xx response.
    ///
    /// Structured API errors (`{"error_code", "message"}`) and SCIM errors
    /// (`{"detail", "status"}`) become [`Error::Api`]; anything else keeps
    /// the raw body.
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        #[derive(serde::Deserialize)]
        struct ApiErrorBody {
            error_code: Option<String>,
            message: Option<String>,
            detail: Option<String>,
            #[serde(rename = "scimType")]
            scim_type: Option<String>,
        }

        if let Ok(parsed) = serde_json::from_slice::<ApiErrorBody>(body) {
            let message = parsed.message.or(parsed.detail);
            if let Some(message) = message {
                let error_code = parsed
                    .error_code
                    .or(parsed.scim_type)
                    .unwrap_or_else(|| format!("HTTP_{status}"));
                return Self::Api {
                    status,
                    error_code,
                    message,
                };
            }
        }

        Self::HttpStatus {
            status,
            body: String::from_utf8_lossy(body).into_owned(),
        }
    }

    /// HTTP status carried by this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::HttpStatus { status, .. } | Error::Api { status, .. } => Some(*status),
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            Error::Connection { .. } | Error::Timeout { .. } => true,
            Error::HttpStatus { status, body } => {
                is_retryable_status(*status) || is_transient_message(*status, body)
            }
            Error::Api {
                status, message, ..
            } => is_retryable_status(*status) || is_transient_message(*status, message),
            _ => false,
        }
    }

    /// Check if this error comes from incomplete or contradictory configuration
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Error::Config { .. }
                | Error::MissingConfigField { .. }
                | Error::NotConfigured { .. }
                | Error::ProfileNotFound { .. }
                | Error::CorruptProfile { .. }
        )
    }
}

/// Check if an HTTP status code is retryable
pub(crate) fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_transient_message(status: u16, message: &str) -> bool {
    status == 400
        && TRANSIENT_ERROR_MESSAGES
            .iter()
            .any(|needle| message.contains(needle))
}

/// Result type alias for dbx-client
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_error_display() {
        let err = Error::config("test message");
        assert_eq!(err.to_string(), "Configuration error: test message");

        let err = Error::missing_field("host");
        assert_eq!(err.to_string(), "Missing required config field: host");

        let err = Error::http_status(404, "Not found");
        assert_eq!(err.to_string(), "HTTP 404: Not found");

        let err = Error::CorruptProfile {
            path: "/home/me/.databrickscfg".to_string(),
            profile: "DEFAULT".to_string(),
            field: "host".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "config file /home/me/.databrickscfg is corrupt: cannot find host in DEFAULT profile"
        );
    }

    #[test_case(429, true ; "too many requests")]
    #[test_case(500, true ; "internal error")]
    #[test_case(502, true ; "bad gateway")]
    #[test_case(503, true ; "unavailable")]
    #[test_case(504, true ; "gateway timeout")]
    #[test_case(400, false ; "bad request")]
    #[test_case(401, false ; "unauthorized")]
    #[test_case(403, false ; "forbidden")]
    #[test_case(404, false ; "not found")]
    fn test_status_retryability(status: u16, expected: bool) {
        assert_eq!(Error::http_status(status, "").is_retryable(), expected);
    }

    #[test]
    fn test_is_retryable() {
        assert!(Error::Timeout { timeout_ms: 1000 }.is_retryable());
        assert!(Error::connection("reset by peer").is_retryable());
        assert!(!Error::config("test").is_retryable());
        assert!(!Error::decode("bad json").is_retryable());
    }

    #[test]
    fn test_transient_bad_request_is_retryable() {
        let err = Error::http_status(
            400,
            "Workspace 123 does not have any associated worker environments",
        );
        assert!(err.is_retryable());

        let err = Error::from_response(
            400,
            br#"{"error_code":"INVALID_STATE","message":"ClusterNotReadyException: starting"}"#,
        );
        assert!(err.is_retryable());

        // Same message on a 404 is still permanent
        let err = Error::from_response(
            404,
            br#"{"error_code":"NOT_FOUND","message":"Unknown worker environment"}"#,
        );
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_from_response_parses_api_error() {
        let err = Error::from_response(
            400,
            br#"{"error_code":"INVALID_PARAMETER_VALUE","message":"bad name"}"#,
        );
        match err {
            Error::Api {
                status,
                error_code,
                message,
            } => {
                assert_eq!(status, 400);
                assert_eq!(error_code, "INVALID_PARAMETER_VALUE");
                assert_eq!(message, "bad name");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_from_response_parses_scim_error() {
        let err = Error::from_response(
            409,
            br#"{"schemas":["urn:ietf:params:scim:api:messages:2.0:Error"],"detail":"Group with name admins already exists.","status":"409"}"#,
        );
        assert_eq!(err.status(), Some(409));
        assert_eq!(err.to_string(), "HTTP_409: Group with name admins already exists.");
    }

    #[test]
    fn test_from_response_keeps_raw_body() {
        let err = Error::from_response(502, b"<html>Bad Gateway</html>");
        assert!(matches!(err, Error::HttpStatus { status: 502, .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_is_config() {
        assert!(Error::config("x").is_config());
        assert!(Error::NotConfigured {
            message: "x".to_string()
        }
        .is_config());
        assert!(!Error::http_status(400, "").is_config());
    }

    #[test]
    fn test_result_context() {
        let result: Result<()> = Err(Error::config("inner"));
        let with_context = result.context("outer");
        assert!(with_context
            .unwrap_err()
            .to_string()
            .contains("outer: Configuration error: inner"));
    }
}
