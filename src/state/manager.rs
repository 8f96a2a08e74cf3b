//! Lazy, one-time authentication
//!
//! The chain runs at most once per client, no matter how many tasks ask
//! for authentication at the same time. After that the result is read
//! without taking any lock.

use super::types::ResolvedAuth;
use crate::auth::{normalize_host, not_configured, Authenticator};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::types::non_empty;
use std::fmt;
use std::sync::OnceLock;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Holds the client config and, once resolved, its authentication
pub struct ClientState {
    /// Set exactly once, never cleared
    resolved: OnceLock<ResolvedAuth>,
    /// Working config; holding the lock means owning resolution
    guard: Mutex<ClientConfig>,
    chain: Vec<Box<dyn Authenticator>>,
    configured_host: Option<String>,
    azure_resource_id: Option<String>,
}

impl ClientState {
    /// Create a state that will resolve `config` with `chain`
    pub fn new(config: ClientConfig, chain: Vec<Box<dyn Authenticator>>) -> Self {
        let configured_host = non_empty(&config.host).map(normalize_host);
        let azure_resource_id = non_empty(&config.azure.resource_id).map(str::to_string);

        Self {
            resolved: OnceLock::new(),
            guard: Mutex::new(config),
            chain,
            configured_host,
            azure_resource_id,
        }
    }

    /// Resolve authentication, or return the cached result.
    ///
    /// Failures are not cached; the next call walks the chain again.
    pub async fn authenticate(&self) -> Result<&ResolvedAuth> {
        if let Some(resolved) = self.resolved.get() {
            return Ok(resolved);
        }

        let mut config = self.guard.lock().await;

        // Another task may have finished resolving while we waited
        if let Some(resolved) = self.resolved.get() {
            return Ok(resolved);
        }

        let resolved = self.walk_chain(&mut config).await?;
        Ok(self.resolved.get_or_init(|| resolved))
    }

    async fn walk_chain(&self, config: &mut ClientConfig) -> Result<ResolvedAuth> {
        for authenticator in &self.chain {
            let name = authenticator.name();
            debug!("Trying {name} authentication");

            let signer = match authenticator.resolve(config).await {
                Ok(Some(signer)) => signer,
                Ok(None) => continue,
                Err(e) => {
                    warn!("{name} authentication failed: {e}");
                    return Err(e);
                }
            };

            let host = normalize_host(non_empty(&config.host).unwrap_or_default());
            if host.is_empty() {
                return Err(Error::config(format!(
                    "{name} authentication did not produce a host"
                )));
            }
            config.host = Some(host.clone());

            info!("Authenticated with {name} ({}) against {host}", signer.kind());
            return Ok(ResolvedAuth {
                host,
                authenticator: name,
                signer,
            });
        }

        Err(not_configured())
    }

    /// Cached resolution, if any
    pub fn resolved(&self) -> Option<&ResolvedAuth> {
        self.resolved.get()
    }

    /// Whether authentication has been resolved
    pub fn is_resolved(&self) -> bool {
        self.resolved.get().is_some()
    }

    /// Best known host: resolved if available, otherwise as configured
    pub fn host(&self) -> Option<&str> {
        self.resolved
            .get()
            .map(|r| r.host.as_str())
            .or(self.configured_host.as_deref())
    }

    /// Azure workspace resource id from the initial config
    pub fn azure_resource_id(&self) -> Option<&str> {
        self.azure_resource_id.as_deref()
    }

    /// Copy of the working config, including what resolution filled in
    pub async fn config_snapshot(&self) -> ClientConfig {
        self.guard.lock().await.clone()
    }
}

impl fmt::Debug for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let chain: Vec<&str> = self.chain.iter().map(|a| a.name()).collect();
        f.debug_struct("ClientState")
            .field("resolved", &self.resolved.get())
            .field("chain", &chain)
            .field("configured_host", &self.configured_host)
            .finish_non_exhaustive()
    }
}
