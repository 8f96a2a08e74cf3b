//! Host plus token, or host plus username and password

use super::chain::Authenticator;
use super::signer::{encode_basic_auth, HeaderSigner};
use super::types::Signer;
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::types::{non_empty, AuthKind};
use async_trait::async_trait;
use tracing::info;

/// Credentials passed directly in the config
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectAuth;

#[async_trait]
impl Authenticator for DirectAuth {
    fn name(&self) -> &'static str {
        "direct"
    }

    async fn resolve(&self, config: &mut ClientConfig) -> Result<Option<Signer>> {
        let (kind, credential, needs_host_because) =
            match (non_empty(&config.username), non_empty(&config.password)) {
                (Some(username), Some(password)) => {
                    let encoded = encode_basic_auth(username, password);
                    info!("Using basic auth for user '{username}'");
                    (AuthKind::Basic, encoded, "basic_auth")
                }
                _ => match non_empty(&config.token) {
                    Some(token) => (AuthKind::Bearer, token.to_string(), "token"),
                    None => return Ok(None),
                },
            };

        // Fail before mutating the config
        if non_empty(&config.host).is_none() {
            return Err(Error::config(format!(
                "host is empty, but is required by {needs_host_because}"
            )));
        }

        // The plaintext password must not outlive a successful encoding
        if kind == AuthKind::Basic {
            config.password = None;
        }

        info!("Using directly configured host+{needs_host_because} authentication");
        let signer = HeaderSigner::authorization(kind.scheme(), &credential)?;
        Ok(Some(Signer::new(kind, signer)))
    }
}
