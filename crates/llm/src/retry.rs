//! Bounded retry with rate-limit awareness and exponential backoff.
//!
//! One logical request moves through `Attempting(1..=max_retries)` and ends
//! either `Succeeded` or `Exhausted` (the last error is returned). Attempts
//! are strictly sequential; the only suspension point is the backoff sleep,
//! which goes through the injected [`Clock`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use insight_core::config::AnalysisConfig;

use crate::clock::Clock;
use crate::error::AnalysisError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(1000),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            max_retries: config.max_retries.max(1),
            initial_backoff: config.initial_backoff(),
            ..Self::default()
        }
    }
}

/// Per-request retry bookkeeping. Never shared between requests.
#[derive(Debug)]
pub struct RetryState {
    pub attempt: u32,
    pub backoff: Duration,
    pub last_error: Option<AnalysisError>,
}

impl RetryState {
    pub fn new(policy: &RetryPolicy) -> Self {
        Self {
            attempt: 1,
            backoff: policy.initial_backoff,
            last_error: None,
        }
    }

    /// Record a retryable `error` and return the wait before the next attempt.
    ///
    /// Rate limits wait for the provider's hint (or the current backoff when
    /// none was given) and leave the backoff untouched; any other failure
    /// waits the current backoff and multiplies it.
    pub fn record_failure(&mut self, error: AnalysisError, multiplier: u32) -> Duration {
        let wait = if error.is_rate_limited() {
            error.retry_after().unwrap_or(self.backoff)
        } else {
            let wait = self.backoff;
            self.backoff = self.backoff.saturating_mul(multiplier);
            wait
        };
        self.last_error = Some(error);
        wait
    }
}

#[derive(Clone)]
pub struct RetryController {
    policy: RetryPolicy,
    clock: Arc<dyn Clock>,
}

impl RetryController {
    pub fn new(policy: RetryPolicy, clock: Arc<dyn Clock>) -> Self {
        Self { policy, clock }
    }

    /// Run `attempt` until it succeeds, fails with a non-retryable error, or
    /// the attempt budget is spent. `attempt` receives the 1-based attempt number.
    pub async fn run<T, F, Fut>(&self, label: &str, mut attempt: F) -> Result<T, AnalysisError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, AnalysisError>>,
    {
        let max = self.policy.max_retries.max(1);
        let mut state = RetryState::new(&self.policy);

        loop {
            debug!(label, attempt = state.attempt, max, "model attempt");
            let error = match attempt(state.attempt).await {
                Ok(value) => {
                    if let Some(previous) = &state.last_error {
                        info!(
                            label,
                            attempt = state.attempt,
                            previous_error = %previous,
                            "succeeded after retry"
                        );
                    }
                    return Ok(value);
                }
                Err(e) => e,
            };

            if !error.is_retryable() {
                warn!(label, attempt = state.attempt, error = %error, "non-retryable failure");
                return Err(error);
            }
            if state.attempt >= max {
                warn!(label, attempts = state.attempt, error = %error, "retries exhausted");
                return Err(error);
            }

            let rate_limited = error.is_rate_limited();
            let wait = state.record_failure(error, self.policy.multiplier);
            if let Some(error) = &state.last_error {
                warn!(
                    label,
                    attempt = state.attempt,
                    rate_limited,
                    wait_ms = wait.as_millis() as u64,
                    error = %error,
                    "attempt failed, backing off"
                );
            }
            self.clock.sleep(wait).await;
            state.attempt += 1;
        }
    }
}
