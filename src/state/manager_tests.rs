//! Tests for ClientState

use super::*;
use crate::auth::{
    default_chain, Authenticator, CommandExecutor, CommandOutput, DirectAuth, HeaderSigner,
    ProfileAuth, Signer,
};
use crate::config::{AzureConfig, ClientConfig};
use crate::error::{Error, Result};
use crate::types::AuthKind;
use async_trait::async_trait;
use futures::future::join_all;
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

/// Authenticator that counts how often it runs
struct CountingAuth {
    calls: Arc<AtomicUsize>,
    fail_first: usize,
}

#[async_trait]
impl Authenticator for CountingAuth {
    fn name(&self) -> &'static str {
        "counting"
    }

    async fn resolve(&self, config: &mut ClientConfig) -> Result<Option<Signer>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        // Give concurrent callers a chance to pile up on the guard
        tokio::time::sleep(Duration::from_millis(20)).await;
        if call <= self.fail_first {
            return Err(Error::auth("identity endpoint unavailable"));
        }
        config.host = Some("abc.cloud.databricks.com".to_string());
        let signer = HeaderSigner::authorization("Bearer", "dapi-counted")?;
        Ok(Some(Signer::new(AuthKind::Bearer, signer)))
    }
}

fn counting_state(fail_first: usize) -> (ClientState, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let chain: Vec<Box<dyn Authenticator>> = vec![Box::new(CountingAuth {
        calls: calls.clone(),
        fail_first,
    })];
    (ClientState::new(ClientConfig::default(), chain), calls)
}

struct CountingCommands(AtomicUsize);

#[async_trait]
impl CommandExecutor for CountingCommands {
    async fn output(&self, _program: &str, _args: &[&str]) -> std::io::Result<CommandOutput> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(CommandOutput {
            success: true,
            stdout: br#"{"accessToken":"aad","expiresOn":"2999-01-01 00:00:00.000000"}"#.to_vec(),
            stderr: Vec::new(),
        })
    }
}

// ============================================================================
// Construction Tests
// ============================================================================

#[test]
fn test_new_state_is_unresolved() {
    let state = ClientState::new(
        ClientConfig::builder().host("abc.cloud.databricks.com").build(),
        vec![Box::new(DirectAuth)],
    );

    assert!(!state.is_resolved());
    assert!(state.resolved().is_none());
    assert_eq!(state.host(), Some("https://abc.cloud.databricks.com"));
}

#[test]
fn test_azure_resource_id_is_kept() {
    let config = ClientConfig::builder()
        .azure(AzureConfig {
            resource_id: Some("/subscriptions/s/resourceGroups/g/providers/Microsoft.Databricks/workspaces/w".to_string()),
            ..AzureConfig::default()
        })
        .build();
    let state = ClientState::new(config, Vec::new());

    assert!(state.azure_resource_id().unwrap().ends_with("/workspaces/w"));
    assert_eq!(state.host(), None);
}

// ============================================================================
// Resolution Tests
// ============================================================================

#[tokio::test]
async fn test_concurrent_authenticate_runs_chain_once() {
    let (state, calls) = counting_state(0);

    let results = join_all((0..32).map(|_| state.authenticate())).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let first = results[0].as_ref().unwrap();
    for result in &results {
        let resolved = result.as_ref().unwrap();
        assert!(resolved.signer.ptr_eq(&first.signer));
    }
    assert!(state.is_resolved());
}

#[tokio::test]
async fn test_resolution_is_reused() {
    let (state, calls) = counting_state(0);

    state.authenticate().await.unwrap();
    state.authenticate().await.unwrap();
    state.authenticate().await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failure_is_not_cached() {
    let (state, calls) = counting_state(1);

    let err = state.authenticate().await.unwrap_err();
    assert!(matches!(err, Error::Auth { .. }));
    assert!(!state.is_resolved());

    let resolved = state.authenticate().await.unwrap();
    assert_eq!(resolved.authenticator, "counting");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_host_is_normalized() {
    let (state, _) = counting_state(0);

    let resolved = state.authenticate().await.unwrap();
    assert_eq!(resolved.host(), "https://abc.cloud.databricks.com");
    assert_eq!(state.host(), Some("https://abc.cloud.databricks.com"));
    assert_eq!(
        state.config_snapshot().await.host.as_deref(),
        Some("https://abc.cloud.databricks.com")
    );
}

#[tokio::test]
async fn test_explicit_scheme_is_kept() {
    let state = ClientState::new(
        ClientConfig::builder()
            .host("http://localhost:8080")
            .token("dapi-local")
            .build(),
        vec![Box::new(DirectAuth)],
    );

    let resolved = state.authenticate().await.unwrap();
    assert_eq!(resolved.host(), "http://localhost:8080");
}

#[tokio::test]
async fn test_password_is_discarded_after_basic_auth() {
    let state = ClientState::new(
        ClientConfig::builder()
            .host("abc.cloud.databricks.com")
            .basic_auth("admin", "s3cret")
            .build(),
        vec![Box::new(DirectAuth)],
    );

    let resolved = state.authenticate().await.unwrap();
    assert_eq!(resolved.kind(), AuthKind::Basic);

    let config = state.config_snapshot().await;
    assert_eq!(config.username.as_deref(), Some("admin"));
    assert!(config.password.is_none());
}

#[tokio::test]
async fn test_basic_auth_without_host_fails_on_every_attempt() {
    let dir = tempdir().unwrap();
    let path = dir.path().join(".databrickscfg");
    std::fs::write(
        &path,
        "[DEFAULT]\nhost = other.cloud.databricks.com\ntoken = dapi-profile\n",
    )
    .unwrap();

    let config = ClientConfig::builder()
        .basic_auth("admin", "s3cret")
        .config_file(path.to_string_lossy())
        .build();
    let state = ClientState::new(config, vec![Box::new(DirectAuth), Box::new(ProfileAuth)]);

    for _ in 0..2 {
        let err = state.authenticate().await.unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("required by basic_auth"));
    }
    assert!(!state.is_resolved());
}

#[tokio::test]
async fn test_empty_chain_is_not_configured() {
    let state = ClientState::new(ClientConfig::default(), Vec::new());

    let err = state.authenticate().await.unwrap_err();
    assert!(matches!(err, Error::NotConfigured { .. }));
    assert!(err.to_string().contains("DATABRICKS_HOST + DATABRICKS_TOKEN"));
}

#[tokio::test]
async fn test_direct_auth_wins_over_azure_cli() {
    let commands = Arc::new(CountingCommands(AtomicUsize::new(0)));
    let config = ClientConfig::builder()
        .host("adb-123.4.azuredatabricks.net")
        .token("dapi-direct")
        .azure(AzureConfig {
            resource_id: Some("/subscriptions/s/workspaces/w".to_string()),
            ..AzureConfig::default()
        })
        .build();
    let state = ClientState::new(
        config,
        default_chain(reqwest::Client::new(), commands.clone()),
    );

    let resolved = state.authenticate().await.unwrap();

    assert_eq!(resolved.kind(), AuthKind::Bearer);
    assert_eq!(resolved.authenticator, "direct");
    assert_eq!(commands.0.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_profile_appearing_later_is_picked_up() {
    let dir = tempdir().unwrap();
    let path = dir.path().join(".databrickscfg");
    let config = ClientConfig::builder()
        .config_file(path.to_string_lossy())
        .build();
    let state = ClientState::new(config, vec![Box::new(ProfileAuth)]);

    // No file yet: every authenticator declines
    let err = state.authenticate().await.unwrap_err();
    assert!(matches!(err, Error::NotConfigured { .. }));

    std::fs::write(
        &path,
        "[DEFAULT]\nhost = dbc-1234.cloud.databricks.com\ntoken = dapi-from-file\n",
    )
    .unwrap();

    let resolved = state.authenticate().await.unwrap();
    assert_eq!(resolved.kind(), AuthKind::Bearer);
    assert_eq!(resolved.host(), "https://dbc-1234.cloud.databricks.com");
}
