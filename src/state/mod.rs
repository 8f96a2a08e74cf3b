//! Client state module
//!
//! Holds the configuration of one client and the authentication it
//! resolves to.
//!
//! # Overview
//!
//! The state module provides:
//! - `ClientState` - lazily walks the authenticator chain exactly once
//! - `ResolvedAuth` - the winning signer and normalized host

mod manager;
mod types;

pub use manager::ClientState;
pub use types::ResolvedAuth;

#[cfg(test)]
mod manager_tests;
