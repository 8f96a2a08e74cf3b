//! Common types used throughout dbx-client
//!
//! Shared enums and small helpers used across the auth, state and
//! client modules.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

// ============================================================================
// Auth Kind
// ============================================================================

/// How requests are authenticated once resolution succeeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthKind {
    /// Personal access token
    Bearer,
    /// Username and password
    Basic,
    /// Azure AD service principal with a client secret
    AzureClientSecret,
    /// Token taken from the local Azure CLI
    AzureCli,
    /// Google service account against the accounts API
    GoogleAccounts,
    /// Google service account against a workspace
    GoogleWorkspace,
}

impl AuthKind {
    /// Whether the credential was obtained through cloud identity federation
    pub fn is_federated(self) -> bool {
        !matches!(self, AuthKind::Bearer | AuthKind::Basic)
    }

    /// Scheme used in the `Authorization` header
    pub fn scheme(self) -> &'static str {
        match self {
            AuthKind::Basic => "Basic",
            _ => "Bearer",
        }
    }
}

impl fmt::Display for AuthKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthKind::Bearer => "bearer",
            AuthKind::Basic => "basic",
            AuthKind::AzureClientSecret => "azure-client-secret",
            AuthKind::AzureCli => "azure-cli",
            AuthKind::GoogleAccounts => "google-accounts",
            AuthKind::GoogleWorkspace => "google-workspace",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Cloud
// ============================================================================

/// Cloud a workspace is deployed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cloud {
    Aws,
    Azure,
    Gcp,
}

impl fmt::Display for Cloud {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Cloud::Aws => "aws",
            Cloud::Azure => "azure",
            Cloud::Gcp => "gcp",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Utilities
// ============================================================================

/// Extension trait for Option<String> to handle empty strings
pub trait OptionStringExt {
    /// Returns None if the string is empty
    fn none_if_empty(self) -> Option<String>;
}

impl OptionStringExt for Option<String> {
    fn none_if_empty(self) -> Option<String> {
        self.filter(|s| !s.is_empty())
    }
}

impl OptionStringExt for String {
    fn none_if_empty(self) -> Option<String> {
        if self.is_empty() {
            None
        } else {
            Some(self)
        }
    }
}

/// Returns the string slice when the option holds a non-empty value
pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_kind_federated() {
        assert!(!AuthKind::Bearer.is_federated());
        assert!(!AuthKind::Basic.is_federated());
        assert!(AuthKind::AzureCli.is_federated());
        assert!(AuthKind::GoogleAccounts.is_federated());
    }

    #[test]
    fn test_auth_kind_scheme() {
        assert_eq!(AuthKind::Basic.scheme(), "Basic");
        assert_eq!(AuthKind::Bearer.scheme(), "Bearer");
        assert_eq!(AuthKind::AzureClientSecret.scheme(), "Bearer");
    }

    #[test]
    fn test_auth_kind_serde() {
        let json = serde_json::to_string(&AuthKind::AzureClientSecret).unwrap();
        assert_eq!(json, "\"azure_client_secret\"");
        assert_eq!(AuthKind::GoogleWorkspace.to_string(), "google-workspace");
    }

    #[test]
    fn test_none_if_empty() {
        assert_eq!(Some(String::new()).none_if_empty(), None);
        assert_eq!(
            Some("x".to_string()).none_if_empty(),
            Some("x".to_string())
        );
        assert_eq!(String::new().none_if_empty(), None);
        assert_eq!(non_empty(&Some(String::new())), None);
        assert_eq!(non_empty(&Some("h".to_string())), Some("h"));
    }
}
