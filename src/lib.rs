// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::needless_pass_by_value)]

//! # dbx-client
//!
//! Credential resolution and a resilient HTTP transport for the
//! Databricks workspace and accounts APIs.
//!
//! ## Features
//!
//! - **One auth method, chosen once**: host + token, basic auth, Azure
//!   service principal, Azure CLI, Google service accounts, or a
//!   `~/.databrickscfg` profile, tried in that order
//! - **Lazy resolution**: the chain runs on the first request, at most once,
//!   however many tasks share the client
//! - **Rate limiting**: token bucket, 15 requests per second by default
//! - **Linear retry**: 10 second waits for up to 5 minutes on transient
//!   failures
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dbx_client::{ApiClient, ClientConfig, Result};
//! use serde_json::Value;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = ClientConfig::builder()
//!         .host("dbc-1234.cloud.databricks.com")
//!         .token("dapi...")
//!         .build();
//!     let client = ApiClient::new(config)?;
//!
//!     let clusters: Value = client.get("api/2.0/clusters/list", None::<&Value>).await?;
//!     println!("{clusters}");
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                          ApiClient                            │
//! │   send(method, path, body) → authenticate → limit → sign →   │
//! │   RetryTransport → decode                                     │
//! └───────────────────────────────────────────────────────────────┘
//!                                │
//! ┌───────────────┬──────────────┴─────┬──────────────────────────┐
//! │     State     │        Auth        │          HTTP            │
//! ├───────────────┼────────────────────┼──────────────────────────┤
//! │ ClientState   │ Direct / Basic     │ HttpTransport            │
//! │ ResolvedAuth  │ Azure secret / CLI │ RetryTransport (linear)  │
//! │               │ Google (acct/ws)   │ RateLimiter (governor)   │
//! │               │ Profile file       │                          │
//! └───────────────┴────────────────────┴──────────────────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Client configuration
pub mod config;

/// Authentication methods and the resolution chain
pub mod auth;

/// HTTP transport with retry and rate limiting
pub mod http;

/// Lazily resolved client state
pub mod state;

/// The API client
pub mod client;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

// Re-export commonly used types
pub use client::{format_url, ApiClient, ApiClientBuilder};
pub use config::{AzureConfig, ClientConfig, GoogleConfig};
pub use http::{RetryPolicy, Transport};
pub use state::ResolvedAuth;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
