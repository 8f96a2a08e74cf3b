//! API client
//!
//! `ApiClient` is the single call path for every control-plane request:
//! authenticate once, wait for the rate limiter, build the URL, sign,
//! send through the retrying transport and decode.
//!
//! Every wait in `send` is an `.await`, so dropping the returned future
//! (for example through `tokio::time::timeout`) cancels the call.

use crate::auth::{default_chain, Authenticator, CommandExecutor, SystemCommandExecutor};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::http::{
    HttpTransport, RateLimiter, RateLimiterConfig, RawResponse, RetryPolicy, RetryTransport,
    Transport, TransportConfig,
};
use crate::state::{ClientState, ResolvedAuth};
use crate::types::{Cloud, JsonValue};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, Request};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, enabled, Level};
use url::Url;

const REDACTED: &str = "**REDACTED**";

/// Authenticated, rate-limited, retrying API client
pub struct ApiClient {
    state: ClientState,
    transport: RetryTransport<Arc<dyn Transport>>,
    limiter: RateLimiter,
    debug_truncate_bytes: usize,
    debug_headers: bool,
}

impl ApiClient {
    /// Client with the default chain, transport and retry policy
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    /// Start building a client for `config`
    pub fn builder(config: ClientConfig) -> ApiClientBuilder {
        ApiClientBuilder::new(config)
    }

    /// Resolve authentication now instead of on the first request
    pub async fn authenticate(&self) -> Result<&ResolvedAuth> {
        self.state.authenticate().await
    }

    /// Client state
    pub fn state(&self) -> &ClientState {
        &self.state
    }

    /// Send a request and decode the JSON response into `T`.
    ///
    /// For GET and DELETE the body is sent as query parameters, otherwise
    /// as a JSON body. An empty response decodes as `null`.
    pub async fn send<B, T>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let auth = self.state.authenticate().await?;
        self.limiter.wait().await;

        let url = Url::parse(&format_url(auth.host(), &[path]))?;
        let mut request = build_request(method, url, body)?;
        auth.signer.sign(&mut request).await?;
        self.log_request(&request);

        let response = self.transport.execute(request).await.map_err(|e| {
            debug!("< {e}");
            e
        })?;
        self.log_response(&response);

        decode(&response.body, self.debug_truncate_bytes)
    }

    /// GET with optional query parameters
    pub async fn get<Q, T>(&self, path: &str, query: Option<&Q>) -> Result<T>
    where
        Q: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(Method::GET, path, query).await
    }

    /// POST a JSON body
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(Method::POST, path, Some(body)).await
    }

    /// PUT a JSON body
    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(Method::PUT, path, Some(body)).await
    }

    /// PATCH a JSON body
    pub async fn patch<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(Method::PATCH, path, Some(body)).await
    }

    /// DELETE with optional query parameters
    pub async fn delete<Q, T>(&self, path: &str, query: Option<&Q>) -> Result<T>
    where
        Q: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(Method::DELETE, path, query).await
    }

    /// Join the known host with `segments`
    pub fn format_url(&self, segments: &[&str]) -> String {
        format_url(self.state.host().unwrap_or_default(), segments)
    }

    /// Cloud the host belongs to
    pub fn cloud(&self) -> Cloud {
        let host = self.state.host().unwrap_or_default();
        if self.state.azure_resource_id().is_some() || host.contains(".azuredatabricks.net") {
            Cloud::Azure
        } else if host.contains(".gcp.databricks.com") {
            Cloud::Gcp
        } else {
            Cloud::Aws
        }
    }

    /// Workspace runs on Azure
    pub fn is_azure(&self) -> bool {
        self.cloud() == Cloud::Azure
    }

    /// Workspace runs on Google Cloud
    pub fn is_gcp(&self) -> bool {
        self.cloud() == Cloud::Gcp
    }

    /// Workspace runs on AWS
    pub fn is_aws(&self) -> bool {
        self.cloud() == Cloud::Aws
    }

    fn log_request(&self, request: &Request) {
        if !enabled!(Level::DEBUG) {
            return;
        }
        let body = request
            .body()
            .and_then(|b| b.as_bytes())
            .map(|b| truncate_body(b, self.debug_truncate_bytes))
            .unwrap_or_default();
        if self.debug_headers {
            debug!(
                "> {} {} {:?} {body}",
                request.method(),
                request.url(),
                redacted_headers(request.headers())
            );
        } else {
            debug!("> {} {} {body}", request.method(), request.url());
        }
    }

    fn log_response(&self, response: &RawResponse) {
        if !enabled!(Level::DEBUG) {
            return;
        }
        let body = truncate_body(&response.body, self.debug_truncate_bytes);
        if self.debug_headers {
            debug!(
                "< {} {:?} {body}",
                response.status,
                redacted_headers(&response.headers)
            );
        } else {
            debug!("< {} {body}", response.status);
        }
    }
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("state", &self.state)
            .field("limiter", &self.limiter)
            .field("retry", self.transport.policy())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`ApiClient`]
pub struct ApiClientBuilder {
    config: ClientConfig,
    chain: Option<Vec<Box<dyn Authenticator>>>,
    transport: Option<Arc<dyn Transport>>,
    retry_policy: RetryPolicy,
    commands: Option<Arc<dyn CommandExecutor>>,
    rate_limiter: Option<RateLimiter>,
}

impl ApiClientBuilder {
    fn new(config: ClientConfig) -> Self {
        Self {
            config,
            chain: None,
            transport: None,
            retry_policy: RetryPolicy::default(),
            commands: None,
            rate_limiter: None,
        }
    }

    /// Replace the authenticator chain
    #[must_use]
    pub fn chain(mut self, chain: Vec<Box<dyn Authenticator>>) -> Self {
        self.chain = Some(chain);
        self
    }

    /// Replace the HTTP transport
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Replace the retry policy
    #[must_use]
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Replace how the default chain runs external commands
    #[must_use]
    pub fn command_executor(mut self, commands: Arc<dyn CommandExecutor>) -> Self {
        self.commands = Some(commands);
        self
    }

    /// Replace the rate limiter, e.g. to share one between clients
    #[must_use]
    pub fn rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    /// Build the client. Authentication is resolved on first use.
    pub fn build(self) -> Result<ApiClient> {
        let transport_config = TransportConfig::from_client_config(&self.config);
        let http_transport = HttpTransport::new(&transport_config)?;

        let chain = match self.chain {
            Some(chain) => chain,
            None => {
                let commands = self
                    .commands
                    .unwrap_or_else(|| Arc::new(SystemCommandExecutor));
                default_chain(http_transport.inner().clone(), commands)
            }
        };
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(http_transport),
        };
        let limiter = self.rate_limiter.unwrap_or_else(|| {
            RateLimiter::new(&RateLimiterConfig::new(self.config.rate_limit()))
        });

        Ok(ApiClient {
            debug_truncate_bytes: self.config.debug_truncate_bytes,
            debug_headers: self.config.debug_headers,
            state: ClientState::new(self.config, chain),
            transport: RetryTransport::new(transport, self.retry_policy),
            limiter,
        })
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Join `host` and `segments` with exactly one `/` between host and path
pub fn format_url(host: &str, segments: &[&str]) -> String {
    let path = segments.concat();
    format!(
        "{}/{}",
        host.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn build_request<B>(method: Method, mut url: Url, body: Option<&B>) -> Result<Request>
where
    B: Serialize + ?Sized,
{
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    let mut payload = None;
    if let Some(body) = body {
        if method == Method::GET || method == Method::DELETE {
            let pairs = query_pairs(&serde_json::to_value(body)?)?;
            if !pairs.is_empty() {
                url.query_pairs_mut().extend_pairs(pairs);
            }
        } else {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            payload = Some(serde_json::to_vec(body)?);
        }
    }

    let mut request = Request::new(method, url);
    *request.headers_mut() = headers;
    if let Some(payload) = payload {
        *request.body_mut() = Some(payload.into());
    }
    Ok(request)
}

/// Flatten a JSON object into query parameters.
///
/// Arrays repeat the key, nested objects are sent as JSON text.
fn query_pairs(value: &JsonValue) -> Result<Vec<(String, String)>> {
    let object = match value {
        JsonValue::Null => return Ok(Vec::new()),
        JsonValue::Object(object) => object,
        other => {
            return Err(Error::config(format!(
                "query parameters must be an object, got {other}"
            )))
        }
    };

    let mut pairs = Vec::new();
    for (key, value) in object {
        match value {
            JsonValue::Null => {}
            JsonValue::Array(items) => {
                for item in items {
                    pairs.push((key.clone(), query_value(item)));
                }
            }
            other => pairs.push((key.clone(), query_value(other))),
        }
    }
    Ok(pairs)
}

fn query_value(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn decode<T: DeserializeOwned>(body: &[u8], truncate_bytes: usize) -> Result<T> {
    let body = if body.iter().all(u8::is_ascii_whitespace) {
        b"null".as_slice()
    } else {
        body
    };
    serde_json::from_slice(body).map_err(|e| {
        Error::decode(format!(
            "{e} in response body {}",
            truncate_body(body, truncate_bytes)
        ))
    })
}

/// Lossy UTF-8 of `body`, cut after `max` characters
pub(crate) fn truncate_body(body: &[u8], max: usize) -> String {
    let text = String::from_utf8_lossy(body);
    let total = text.chars().count();
    if total <= max {
        return text.into_owned();
    }
    let kept: String = text.chars().take(max).collect();
    format!("{kept}... ({} more chars)", total - max)
}

fn is_secret_header(name: &str) -> bool {
    name == AUTHORIZATION.as_str() || (name.starts_with("x-databricks-") && name.ends_with("-token"))
}

fn redacted_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let shown = if is_secret_header(name.as_str()) || value.is_sensitive() {
                REDACTED.to_string()
            } else {
                String::from_utf8_lossy(value.as_bytes()).into_owned()
            };
            (name.as_str().to_string(), shown)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{DirectAuth, ACCESS_TOKEN_HEADER};
    use crate::config::AzureConfig;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use test_case::test_case;

    fn client_for(host: &str) -> ApiClient {
        ApiClient::builder(ClientConfig::builder().host(host).token("dapi").build())
            .chain(vec![Box::new(DirectAuth)])
            .build()
            .unwrap()
    }

    #[test_case("https://abc.cloud.databricks.com", "api/2.0/x" ; "no slashes")]
    #[test_case("https://abc.cloud.databricks.com/", "api/2.0/x" ; "host slash")]
    #[test_case("https://abc.cloud.databricks.com", "/api/2.0/x" ; "path slash")]
    #[test_case("https://abc.cloud.databricks.com//", "//api/2.0/x" ; "both slashes")]
    fn test_format_url_single_separator(host: &str, path: &str) {
        assert_eq!(
            format_url(host, &[path]),
            "https://abc.cloud.databricks.com/api/2.0/x"
        );
    }

    #[test_case("host/", &["a", "b"] ; "trailing slash host")]
    #[test_case("host", &["a", "b"] ; "bare host")]
    fn test_format_url_concatenates_segments(host: &str, segments: &[&str]) {
        assert_eq!(format_url(host, segments), "host/ab");
    }

    #[test]
    fn test_format_url_segments() {
        assert_eq!(
            format_url("https://h", &["api/2.0/", "preview/scim/v2/", "Groups"]),
            "https://h/api/2.0/preview/scim/v2/Groups"
        );
    }

    #[test]
    fn test_client_format_url_uses_configured_host() {
        let client = client_for("abc.cloud.databricks.com");
        assert_eq!(
            client.format_url(&["api/2.0/clusters/list"]),
            "https://abc.cloud.databricks.com/api/2.0/clusters/list"
        );
    }

    #[test_case("https://adb-123.4.azuredatabricks.net", Cloud::Azure ; "azure")]
    #[test_case("https://1234.5.gcp.databricks.com", Cloud::Gcp ; "gcp")]
    #[test_case("https://dbc-1234.cloud.databricks.com", Cloud::Aws ; "aws")]
    fn test_cloud_from_host(host: &str, expected: Cloud) {
        let client = client_for(host);
        assert_eq!(client.cloud(), expected);
        assert_eq!(client.is_azure(), expected == Cloud::Azure);
        assert_eq!(client.is_gcp(), expected == Cloud::Gcp);
        assert_eq!(client.is_aws(), expected == Cloud::Aws);
    }

    #[test]
    fn test_resource_id_means_azure() {
        let config = ClientConfig::builder()
            .azure(AzureConfig {
                resource_id: Some("/subscriptions/s/workspaces/w".to_string()),
                ..AzureConfig::default()
            })
            .build();
        let client = ApiClient::builder(config).chain(Vec::new()).build().unwrap();
        assert!(client.is_azure());
    }

    #[test]
    fn test_get_body_becomes_query() {
        let url = Url::parse("https://h/api/2.0/jobs/list").unwrap();
        let body = json!({"limit": 25, "expand_tasks": true, "name": "nightly run", "skip": null});
        let request = build_request(Method::GET, url, Some(&body)).unwrap();

        assert!(request.body().is_none());
        let mut query: Vec<_> = request.url().query_pairs().into_owned().collect();
        query.sort();
        assert_eq!(
            query,
            vec![
                ("expand_tasks".to_string(), "true".to_string()),
                ("limit".to_string(), "25".to_string()),
                ("name".to_string(), "nightly run".to_string()),
            ]
        );
    }

    #[test]
    fn test_query_arrays_repeat_key() {
        let pairs = query_pairs(&json!({"id": [1, 2]})).unwrap();
        assert_eq!(
            pairs,
            vec![
                ("id".to_string(), "1".to_string()),
                ("id".to_string(), "2".to_string())
            ]
        );
    }

    #[test]
    fn test_query_must_be_object() {
        let err = query_pairs(&json!([1, 2])).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_post_body_is_json() {
        let url = Url::parse("https://h/api/2.0/clusters/create").unwrap();
        let body = json!({"cluster_name": "etl"});
        let request = build_request(Method::POST, url, Some(&body)).unwrap();

        assert_eq!(request.url().query(), None);
        assert_eq!(
            request.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(
            request.body().and_then(|b| b.as_bytes()).unwrap(),
            br#"{"cluster_name":"etl"}"#
        );
    }

    #[test]
    fn test_decode_empty_body_as_unit() {
        let _: () = decode(b"", 96).unwrap();
        let _: () = decode(b"  \n", 96).unwrap();
        let value: Option<JsonValue> = decode(b"", 96).unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn test_decode_failure() {
        let err = decode::<JsonValue>(b"<html>oops</html>", 4).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
        assert!(err.to_string().contains("<htm... (13 more chars)"));
    }

    #[test]
    fn test_truncate_body() {
        assert_eq!(truncate_body(b"short", 96), "short");
        assert_eq!(truncate_body(b"abcdef", 3), "abc... (3 more chars)");
        // Multi-byte characters are never split
        assert_eq!(truncate_body("héllo".as_bytes(), 2), "hé... (3 more chars)");
    }

    #[test]
    fn test_redacted_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer dapi123"));
        headers.insert(
            reqwest::header::HeaderName::from_bytes(ACCESS_TOKEN_HEADER.as_bytes()).unwrap(),
            HeaderValue::from_static("ya29.secret"),
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let shown = redacted_headers(&headers);
        let value = |name: &str| {
            shown
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.clone())
                .unwrap()
        };
        assert_eq!(value("authorization"), REDACTED);
        assert_eq!(value("x-databricks-gcp-sa-access-token"), REDACTED);
        assert_eq!(value("accept"), "application/json");
    }
}
