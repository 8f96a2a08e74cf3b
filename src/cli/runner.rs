//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands, ConnectionArgs, OutputFormat};
use crate::client::ApiClient;
use crate::config::ClientConfig;
use crate::error::{Error, Result, ResultExt};
use crate::types::OptionStringExt;
use reqwest::Method;
use serde_json::{json, Value};

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        let client = ApiClient::new(self.client_config()?)?;

        match &self.cli.command {
            Commands::Auth => self.auth(&client).await,
            Commands::Get { path, query } => {
                let query = parse_json("query", query.as_deref())?;
                let response: Value = client.get(path, query.as_ref()).await?;
                self.output(&response);
                Ok(())
            }
            Commands::Request { method, path, body } => {
                let method = Method::from_bytes(method.to_uppercase().as_bytes())
                    .map_err(|e| Error::config(format!("invalid HTTP method {method}: {e}")))?;
                let body = parse_json("body", body.as_deref())?;
                let response: Value = client.send(method, path, body.as_ref()).await?;
                self.output(&response);
                Ok(())
            }
        }
    }

    /// Build the client config: JSON file first, then flags and environment
    pub fn client_config(&self) -> Result<ClientConfig> {
        let base = match &self.cli.config {
            Some(path) => ClientConfig::from_json_file(path)
                .with_context(|| format!("loading --config {}", path.display()))?,
            None => ClientConfig::default(),
        };
        Ok(apply_overrides(base, &self.cli.connection))
    }

    async fn auth(&self, client: &ApiClient) -> Result<()> {
        let resolved = client.authenticate().await?;
        self.output(&json!({
            "type": "AUTH",
            "auth": {
                "kind": resolved.kind(),
                "authenticator": resolved.authenticator,
                "host": resolved.host(),
                "cloud": client.cloud(),
            }
        }));
        Ok(())
    }

    /// Output a message
    fn output(&self, msg: &Value) {
        match self.cli.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(msg).unwrap_or_default());
            }
            OutputFormat::Pretty => {
                println!("{}", serde_json::to_string_pretty(msg).unwrap_or_default());
            }
        }
    }
}

fn parse_json(what: &str, raw: Option<&str>) -> Result<Option<Value>> {
    raw.map(|s| {
        serde_json::from_str(s).map_err(|e| Error::config(format!("Invalid {what} JSON: {e}")))
    })
    .transpose()
}

fn apply_overrides(mut config: ClientConfig, args: &ConnectionArgs) -> ClientConfig {
    // Empty environment variables do not clear values from the file
    fn set(target: &mut Option<String>, value: &Option<String>) {
        if let Some(value) = value.clone().none_if_empty() {
            *target = Some(value);
        }
    }

    set(&mut config.host, &args.host);
    set(&mut config.token, &args.token);
    set(&mut config.username, &args.username);
    set(&mut config.password, &args.password);
    set(&mut config.profile, &args.profile);
    set(&mut config.config_file, &args.config_file);
    set(&mut config.account_id, &args.account_id);
    set(
        &mut config.azure.resource_id,
        &args.azure_workspace_resource_id,
    );
    set(&mut config.azure.client_id, &args.azure_client_id);
    set(&mut config.azure.client_secret, &args.azure_client_secret);
    set(&mut config.azure.tenant_id, &args.azure_tenant_id);
    set(
        &mut config.google.service_account,
        &args.google_service_account,
    );
    set(&mut config.google.credentials, &args.google_credentials);

    config.insecure_skip_verify |= args.insecure_skip_verify;
    config.debug_headers |= args.debug_headers;
    if let Some(seconds) = args.http_timeout_seconds {
        config.http_timeout_seconds = seconds;
    }
    if let Some(rps) = args.rate_limit {
        config.rate_limit_per_second = rps;
    }
    if let Some(bytes) = args.debug_truncate_bytes {
        config.debug_truncate_bytes = bytes;
    }
    config
}
