//! Retry Logic
//!
//! Exponential backoff retry decorator for remote calls. Applied uniformly to
//! every Bitrix24 call; the retryable-error predicate decides which failures
//! earn another attempt.

use crate::{Error, Result};
use serde::Deserialize;
use std::time::Duration;

/// Retry policy: bounded attempts with exponentially increasing, capped delay.
///
/// **Backoff Strategy:**
/// - Delay before attempt `n + 1` is `base_delay * 2^(n - 1)`
/// - Capped at `max_delay`
/// - Defaults: 3 attempts, 4s base, 10s cap
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds
    pub base_delay_ms: u64,
    /// Upper bound for any single delay, in milliseconds
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 4_000,
            max_delay_ms: 10_000,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay_ms,
            max_delay_ms,
        }
    }

    /// Delay to wait after the given failed attempt (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms))
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error, or
    /// `max_attempts` is reached. The last error is returned on exhaustion.
    ///
    /// # Arguments
    /// * `operation_name` - Name for logging (e.g., "crm.company.add")
    /// * `is_retryable` - Predicate deciding whether an error earns another attempt
    /// * `operation` - Async closure performing the remote call
    pub async fn run<F, Fut, T, P>(
        &self,
        operation_name: &str,
        is_retryable: P,
        mut operation: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
        P: Fn(&Error) -> bool,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            match operation().await {
                Ok(result) => {
                    if attempt > 1 {
                        tracing::debug!(
                            operation = operation_name,
                            attempt,
                            "Remote call succeeded after retry"
                        );
                    }
                    return Ok(result);
                }
                Err(err) => {
                    if !is_retryable(&err) {
                        return Err(err);
                    }

                    if attempt >= max_attempts {
                        tracing::error!(
                            operation = operation_name,
                            attempt,
                            error = %err,
                            "Remote call failed: retry attempts exhausted"
                        );
                        return Err(err);
                    }

                    let delay = self.delay_after(attempt);
                    tracing::warn!(
                        operation = operation_name,
                        attempt,
                        max_attempts,
                        backoff_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient failure, will retry after backoff"
                    );

                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
