//! Exponential backoff with jitter around LLM calls.

use rand::prelude::*;
use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::error::LlmError;

/// Retry schedule for transient LLM failures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff: Duration::from_secs_f64(config.initial_backoff_secs.max(0.0)),
            max_backoff: Duration::from_secs_f64(config.max_backoff_secs.max(0.0)),
        }
    }
}

/// Whether an error is worth retrying: rate limits, server errors, timeouts
/// and connection failures.
pub fn is_retryable(error: &LlmError) -> bool {
    match error {
        LlmError::RateLimited(_) => true,
        LlmError::ApiError { code, .. } => *code >= 500 || *code == 429,
        LlmError::Timeout(_) | LlmError::Connection(_) => true,
        _ => false,
    }
}

/// Runs `operation` until it succeeds, fails with a non-retryable error, or
/// the policy is exhausted.
///
/// The closure receives the zero-based attempt number. Each retry sleeps the
/// current backoff plus up to 25% jitter, then doubles the backoff up to
/// `max_backoff`.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: RetryPolicy,
    mut operation: F,
) -> Result<T, LlmError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    let mut backoff = policy.initial_backoff;
    let mut attempt = 0u32;

    loop {
        let err = match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !is_retryable(&err) {
            return Err(err);
        }

        if attempt >= policy.max_retries {
            tracing::error!(
                attempts = attempt + 1,
                error = %err,
                "Retries exhausted"
            );
            return Err(LlmError::RetriesExhausted {
                attempts: attempt + 1,
                last: Box::new(err),
            });
        }

        let jitter = backoff.mul_f64(rand::rng().random_range(0.0..=0.25));
        let delay = backoff + jitter;
        tracing::warn!(
            attempt = attempt + 1,
            max_retries = policy.max_retries,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Transient error, will retry"
        );
        tokio::time::sleep(delay).await;

        backoff = (backoff * 2).min(policy.max_backoff);
        attempt += 1;
    }
}
