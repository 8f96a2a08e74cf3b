//! CLI commands and argument parsing

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Databricks control-plane API client
#[derive(Parser, Debug)]
#[command(name = "dbx")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (JSON), overridden by flags and environment
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Output format
    #[arg(short, long, global = true, default_value = "pretty")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Connection and credential flags
#[derive(Args, Debug, Default, Clone)]
pub struct ConnectionArgs {
    /// Workspace or accounts host
    #[arg(long, env = "DATABRICKS_HOST", global = true)]
    pub host: Option<String>,

    /// Personal access token
    #[arg(long, env = "DATABRICKS_TOKEN", hide_env_values = true, global = true)]
    pub token: Option<String>,

    /// Username for basic auth
    #[arg(long, env = "DATABRICKS_USERNAME", global = true)]
    pub username: Option<String>,

    /// Password for basic auth
    #[arg(long, env = "DATABRICKS_PASSWORD", hide_env_values = true, global = true)]
    pub password: Option<String>,

    /// Profile inside the profile file
    #[arg(long, env = "DATABRICKS_CONFIG_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Profile file location
    #[arg(long, env = "DATABRICKS_CONFIG_FILE", global = true)]
    pub config_file: Option<String>,

    /// Account id, selects the accounts API
    #[arg(long, env = "DATABRICKS_ACCOUNT_ID", global = true)]
    pub account_id: Option<String>,

    /// Azure workspace resource id
    #[arg(long, env = "DATABRICKS_AZURE_WORKSPACE_RESOURCE_ID", global = true)]
    pub azure_workspace_resource_id: Option<String>,

    /// Azure service principal application id
    #[arg(long, env = "ARM_CLIENT_ID", global = true)]
    pub azure_client_id: Option<String>,

    /// Azure service principal secret
    #[arg(long, env = "ARM_CLIENT_SECRET", hide_env_values = true, global = true)]
    pub azure_client_secret: Option<String>,

    /// Azure tenant id
    #[arg(long, env = "ARM_TENANT_ID", global = true)]
    pub azure_tenant_id: Option<String>,

    /// Google service account email
    #[arg(long, env = "DATABRICKS_GOOGLE_SERVICE_ACCOUNT", global = true)]
    pub google_service_account: Option<String>,

    /// Google service account key (path or JSON)
    #[arg(long, env = "GOOGLE_CREDENTIALS", hide_env_values = true, global = true)]
    pub google_credentials: Option<String>,

    /// Skip TLS certificate verification
    #[arg(long, global = true)]
    pub insecure_skip_verify: bool,

    /// Per-attempt HTTP timeout in seconds
    #[arg(long, global = true)]
    pub http_timeout_seconds: Option<u64>,

    /// Maximum requests per second
    #[arg(long, global = true)]
    pub rate_limit: Option<u32>,

    /// Body bytes shown in debug logs
    #[arg(long, global = true)]
    pub debug_truncate_bytes: Option<usize>,

    /// Show (redacted) headers in debug logs
    #[arg(long, global = true)]
    pub debug_headers: bool,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve authentication and show which method won
    Auth,

    /// GET an API path
    Get {
        /// Path relative to the host, e.g. api/2.0/clusters/list
        path: String,

        /// Query parameters as a JSON object
        #[arg(long)]
        query: Option<String>,
    },

    /// Send a request with any method
    Request {
        /// HTTP method
        method: String,

        /// Path relative to the host
        path: String,

        /// Request body (JSON); query parameters for GET and DELETE
        #[arg(long)]
        body: Option<String>,
    },
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Compact JSON, one document per line
    Json,
    /// Indented JSON
    Pretty,
}
