//! Resolved authentication state

use crate::auth::Signer;
use crate::types::AuthKind;

/// Outcome of walking the authenticator chain.
///
/// Created once per client and never changed afterwards.
#[derive(Debug, Clone)]
pub struct ResolvedAuth {
    /// Workspace or accounts host with its scheme normalized
    pub host: String,
    /// Name of the authenticator that won
    pub authenticator: &'static str,
    /// Signs every outgoing request
    pub signer: Signer,
}

impl ResolvedAuth {
    /// Authentication kind in use
    pub fn kind(&self) -> AuthKind {
        self.signer.kind()
    }

    /// Resolved host
    pub fn host(&self) -> &str {
        &self.host
    }
}
