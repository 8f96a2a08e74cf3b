//! The authenticator chain
//!
//! Authenticators are tried in a fixed order. Each one inspects the
//! config and either produces a signer, declines, or fails the whole
//! resolution when the config is clearly meant for it but incomplete.

use super::azure::{AzureCliAuth, AzureClientSecretAuth};
use super::command::CommandExecutor;
use super::direct::DirectAuth;
use super::google::{GoogleAuth, GoogleSurface};
use super::profile::ProfileAuth;
use super::types::Signer;
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;

/// One strategy in the resolution chain
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Try to authenticate with the given config.
    ///
    /// `Ok(None)` passes resolution on to the next authenticator. The
    /// config is mutable so an authenticator can fill in the host it
    /// discovered or drop secrets it no longer needs.
    async fn resolve(&self, config: &mut ClientConfig) -> Result<Option<Signer>>;
}

/// The default chain, in precedence order
pub fn default_chain(
    http: Client,
    commands: Arc<dyn CommandExecutor>,
) -> Vec<Box<dyn Authenticator>> {
    vec![
        Box::new(DirectAuth),
        Box::new(AzureClientSecretAuth::new(http.clone())),
        Box::new(AzureCliAuth::new(commands)),
        Box::new(GoogleAuth::new(http.clone(), GoogleSurface::Accounts)),
        Box::new(GoogleAuth::new(http, GoogleSurface::Workspace)),
        Box::new(ProfileAuth),
    ]
}

/// Prefix scheme-less hosts with `https://`
pub fn normalize_host(host: &str) -> String {
    if host.is_empty() || host.starts_with("https://") || host.starts_with("http://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}

/// Error returned when no authenticator applies
pub(crate) fn not_configured() -> Error {
    Error::NotConfigured {
        message: "authentication is not configured for provider. Please configure it\n\
                  through one of the following options:\n\
                  1. DATABRICKS_HOST + DATABRICKS_TOKEN environment variables.\n\
                  2. host + token provider arguments.\n\
                  3. host + username + password for basic authentication.\n\
                  4. azure_workspace_resource_id + AZ CLI authentication.\n\
                  5. azure_workspace_resource_id + azure_client_id + azure_client_secret + \
                  azure_tenant_id for Azure Service Principal authentication.\n\
                  6. google_service_account + google_credentials for GCP authentication.\n\
                  7. Run `databricks configure --token` that will create ~/.databrickscfg file."
            .to_string(),
    }
}
