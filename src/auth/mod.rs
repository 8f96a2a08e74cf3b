//! Authentication module
//!
//! Supports: host + token, basic auth, Azure service principal, Azure CLI,
//! Google service accounts (accounts and workspace APIs), profile file.
//!
//! Each method is an `Authenticator` in an ordered chain. The first one
//! that applies produces a `Signer`, which is then reused for every
//! request the client sends.

mod azure;
mod chain;
mod command;
mod direct;
mod google;
mod profile;
mod signer;
mod types;

pub use azure::{AzureCliAuth, AzureClientSecretAuth, AZURE_DATABRICKS_APP_ID, RESOURCE_ID_HEADER};
pub use chain::{default_chain, normalize_host, Authenticator};
pub(crate) use chain::not_configured;
pub use command::{CommandExecutor, CommandOutput, SystemCommandExecutor};
pub use direct::DirectAuth;
pub use google::{is_accounts_host, GoogleAuth, GoogleSurface, ServiceAccountKey, ACCESS_TOKEN_HEADER};
pub use profile::{expand_home, ProfileAuth};
pub use signer::{encode_basic_auth, HeaderSigner, SignRequest, TokenSigner, TokenSource};
pub use types::{CachedToken, Signer};
