//! HTTP module
//!
//! Provides the transport with retry and rate limiting.
//!
//! # Features
//!
//! - **Transport trait**: a single seam for sending requests, with a
//!   reqwest implementation tuned for control-plane latency
//! - **Automatic Retries**: `RetryTransport` decorator with linear backoff
//! - **Rate Limiting**: Token bucket rate limiter using governor

mod client;
mod rate_limit;
mod retry;

pub use client::{
    HttpTransport, RawResponse, Transport, TransportConfig, BASE_IDLE_CONN_TIMEOUT,
    BASE_TLS_HANDSHAKE_TIMEOUT, CONNECTION_TIMEOUT_FACTOR,
};
pub use rate_limit::{RateLimiter, RateLimiterConfig};
pub use retry::{
    RetryDecision, RetryPolicy, RetryTransport, RetryVeto, DEFAULT_RETRY_BUDGET,
    DEFAULT_RETRY_WAIT,
};
