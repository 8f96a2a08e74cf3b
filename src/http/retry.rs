//! Bounded linear retry
//!
//! `RetryTransport` decorates any `Transport`. The wait between attempts
//! is constant (no exponential growth, no jitter) and the total time spent
//! on one logical request is capped by the policy's budget.

use super::client::{RawResponse, Transport};
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::{Method, Request};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Wait between two attempts
pub const DEFAULT_RETRY_WAIT: Duration = Duration::from_secs(10);

/// Total time one logical request may spend retrying
pub const DEFAULT_RETRY_BUDGET: Duration = Duration::from_secs(5 * 60);

/// Verdict on one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Transient failure, try again
    Retry,
    /// Got a successful response
    StopSuccess,
    /// Permanent failure, report it now
    StopFatal,
}

/// Predicate that can refuse a retry the policy would otherwise take
pub type RetryVeto = Arc<dyn Fn(&Method, &Error) -> bool + Send + Sync>;

/// Linear backoff retry policy
#[derive(Clone)]
pub struct RetryPolicy {
    wait: Duration,
    budget: Duration,
    veto: Option<RetryVeto>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_WAIT, DEFAULT_RETRY_BUDGET)
    }
}

impl RetryPolicy {
    /// Fixed `wait` between attempts, at most `budget` in total
    pub fn new(wait: Duration, budget: Duration) -> Self {
        Self {
            wait,
            budget,
            veto: None,
        }
    }

    /// Never retry
    pub fn no_retry() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    /// Refuse retries for which `veto` returns true
    #[must_use]
    pub fn with_veto(
        mut self,
        veto: impl Fn(&Method, &Error) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.veto = Some(Arc::new(veto));
        self
    }

    /// Delay before the attempt following `attempt`
    pub fn backoff(&self, _attempt: u32) -> Duration {
        self.wait
    }

    /// Total retry budget
    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Attempts allowed within the budget, at least one
    pub fn max_attempts(&self) -> u32 {
        if self.wait.is_zero() {
            return 1;
        }
        let attempts = self.budget.as_millis() / self.wait.as_millis().max(1);
        u32::try_from(attempts).unwrap_or(u32::MAX).max(1)
    }

    /// Classify the outcome of one attempt.
    ///
    /// `outcome` is `Ok` only for successful responses.
    pub fn classify(&self, method: &Method, outcome: &Result<RawResponse>) -> RetryDecision {
        match outcome {
            Ok(_) => RetryDecision::StopSuccess,
            Err(e) if !e.is_retryable() => RetryDecision::StopFatal,
            Err(e) => match &self.veto {
                Some(veto) if veto(method, e) => RetryDecision::StopFatal,
                _ => RetryDecision::Retry,
            },
        }
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("wait", &self.wait)
            .field("budget", &self.budget)
            .field("has_veto", &self.veto.is_some())
            .finish()
    }
}

/// Transport decorator that retries transient failures
#[derive(Debug, Clone)]
pub struct RetryTransport<T> {
    inner: T,
    policy: RetryPolicy,
}

impl<T: Transport> RetryTransport<T> {
    /// Wrap `inner` with `policy`
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// The active policy
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl<T: Transport> Transport for RetryTransport<T> {
    /// Non-2xx responses come back as errors from this transport
    async fn execute(&self, request: Request) -> Result<RawResponse> {
        let method = request.method().clone();
        let url = request.url().clone();
        let max_attempts = self.policy.max_attempts();
        let started = tokio::time::Instant::now();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let this_try = request
                .try_clone()
                .ok_or_else(|| Error::Other("request body cannot be replayed".to_string()))?;

            let outcome = match self.inner.execute(this_try).await {
                Ok(response) if response.status.is_success() => Ok(response),
                Ok(response) => Err(Error::from_response(
                    response.status.as_u16(),
                    &response.body,
                )),
                Err(e) => Err(e),
            };

            match self.policy.classify(&method, &outcome) {
                RetryDecision::StopSuccess | RetryDecision::StopFatal => return outcome,
                RetryDecision::Retry => {
                    let wait = self.policy.backoff(attempt);
                    if attempt >= max_attempts || started.elapsed() + wait > self.policy.budget()
                    {
                        warn!("{method} {url} still failing after {attempt} attempts, giving up");
                        return outcome;
                    }
                    if let Err(e) = &outcome {
                        info!(
                            "{method} {url} failed: {e}, attempt {attempt}/{max_attempts}, retrying in {wait:?}"
                        );
                    }
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }
}
