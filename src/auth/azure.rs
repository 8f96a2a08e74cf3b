//! Azure AD federation
//!
//! Two ways to get an AAD token for the Azure Databricks application:
//! a service principal secret exchanged at the AAD token endpoint, or the
//! token cache of a locally logged-in `az` CLI.

use super::chain::Authenticator;
use super::command::CommandExecutor;
use super::signer::{TokenSigner, TokenSource};
use super::types::{CachedToken, Signer, TokenResponse};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::types::{non_empty, AuthKind};
use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Application id of Azure Databricks in every AAD tenant
pub const AZURE_DATABRICKS_APP_ID: &str = "2ff814a6-3304-4ab8-85cb-cd0e6f879c1d";

/// Header carrying the workspace resource id
pub const RESOURCE_ID_HEADER: &str = "X-Databricks-Azure-Workspace-Resource-Id";

const AZ_PROGRAM: &str = "az";

fn require_host(config: &ClientConfig, method: &str) -> Result<()> {
    if non_empty(&config.host).is_none() {
        return Err(Error::config(format!(
            "host is empty, but is required by {method}"
        )));
    }
    Ok(())
}

// ============================================================================
// Service principal with client secret
// ============================================================================

/// Service principal authentication with a client secret
pub struct AzureClientSecretAuth {
    http: Client,
}

impl AzureClientSecretAuth {
    pub fn new(http: Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Authenticator for AzureClientSecretAuth {
    fn name(&self) -> &'static str {
        "azure-client-secret"
    }

    async fn resolve(&self, config: &mut ClientConfig) -> Result<Option<Signer>> {
        let azure = &config.azure;
        let (Some(client_id), Some(client_secret), Some(tenant_id)) = (
            non_empty(&azure.client_id),
            non_empty(&azure.client_secret),
            non_empty(&azure.tenant_id),
        ) else {
            return Ok(None);
        };
        require_host(config, "azure_client_secret")?;

        let source = ClientSecretSource {
            http: self.http.clone(),
            token_url: format!(
                "{}/{tenant_id}/oauth2/v2.0/token",
                config.azure.login_endpoint()
            ),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            scope: format!("{AZURE_DATABRICKS_APP_ID}/.default"),
        };
        let token = source.fetch().await?;
        info!("Using Azure service principal authentication for client {client_id}");

        let mut signer = TokenSigner::new(source, token);
        if let Some(resource_id) = non_empty(&config.azure.resource_id) {
            signer = signer.with_header(RESOURCE_ID_HEADER, resource_id)?;
        }
        Ok(Some(Signer::new(AuthKind::AzureClientSecret, signer)))
    }
}

struct ClientSecretSource {
    http: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    scope: String,
}

#[async_trait]
impl TokenSource for ClientSecretSource {
    async fn fetch(&self) -> Result<CachedToken> {
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", self.scope.as_str()),
        ];

        let response = self
            .http
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(Error::Http)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::oauth2(format!(
                "Azure AD token request failed with status {status}: {body}"
            )));
        }

        let token_response: TokenResponse = response.json().await.map_err(Error::Http)?;
        token_response
            .into_cached_token()
            .ok_or_else(|| Error::oauth2("Azure AD response has no access_token"))
    }
}

// ============================================================================
// Azure CLI
// ============================================================================

/// Token from the local `az` CLI login
pub struct AzureCliAuth {
    commands: Arc<dyn CommandExecutor>,
}

impl AzureCliAuth {
    pub fn new(commands: Arc<dyn CommandExecutor>) -> Self {
        Self { commands }
    }
}

#[async_trait]
impl Authenticator for AzureCliAuth {
    fn name(&self) -> &'static str {
        "azure-cli"
    }

    async fn resolve(&self, config: &mut ClientConfig) -> Result<Option<Signer>> {
        let Some(resource_id) = non_empty(&config.azure.resource_id) else {
            return Ok(None);
        };
        require_host(config, "azure_cli")?;

        let source = AzureCliSource {
            commands: Arc::clone(&self.commands),
        };
        let Some(token) = source.run().await? else {
            info!("Azure CLI is not installed, skipping azure-cli authentication");
            return Ok(None);
        };
        info!("Using Azure CLI authentication");

        let signer = TokenSigner::new(source, token).with_header(RESOURCE_ID_HEADER, resource_id)?;
        Ok(Some(Signer::new(AuthKind::AzureCli, signer)))
    }
}

struct AzureCliSource {
    commands: Arc<dyn CommandExecutor>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AzCliToken {
    access_token: String,
    #[serde(default)]
    expires_on: Option<String>,
    #[serde(default, rename = "expires_on")]
    expires_on_unix: Option<i64>,
}

impl AzureCliSource {
    /// `Ok(None)` when `az` is not on the PATH
    async fn run(&self) -> Result<Option<CachedToken>> {
        let args = [
            "account",
            "get-access-token",
            "--resource",
            AZURE_DATABRICKS_APP_ID,
            "--output",
            "json",
        ];
        debug!("Running {AZ_PROGRAM} {}", args.join(" "));

        let output = match self.commands.output(AZ_PROGRAM, &args).await {
            Ok(output) => output,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::Command {
                    program: AZ_PROGRAM.to_string(),
                    message: e.to_string(),
                })
            }
        };

        if !output.success {
            return Err(Error::Command {
                program: AZ_PROGRAM.to_string(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let parsed: AzCliToken = serde_json::from_slice(&output.stdout).map_err(|e| {
            Error::Command {
                program: AZ_PROGRAM.to_string(),
                message: format!("unexpected output: {e}"),
            }
        })?;
        let expires_at = parsed
            .expires_on_unix
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .or_else(|| parsed.expires_on.as_deref().and_then(parse_local_time));

        Ok(Some(CachedToken::new(parsed.access_token, expires_at)))
    }
}

#[async_trait]
impl TokenSource for AzureCliSource {
    async fn fetch(&self) -> Result<CachedToken> {
        self.run().await?.ok_or_else(|| Error::Command {
            program: AZ_PROGRAM.to_string(),
            message: "no longer available on PATH".to_string(),
        })
    }
}

/// `az` prints expiry as local wall-clock time, e.g. `2024-05-01 13:45:10.123456`
fn parse_local_time(value: &str) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f").ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}
