//! Bounded retry with exponential backoff
//!
//! Only errors whose [`LlmError::is_retryable`] is true are retried. A
//! logical failure returns on the attempt that produced it.

use std::future::Future;

use tokio::time::{sleep, Duration};
use tracing::warn;

use crate::error::{CategorizeError, LlmError};

/// Retry configuration
///
/// The wait after attempt `n` (1-based) is `multiplier * 2^(n-1)` seconds,
/// clamped to `[min_wait, max_wait]`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub multiplier: f64,
    pub min_wait: Duration,
    pub max_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            multiplier: 1.0,
            min_wait: Duration::from_secs(4),
            max_wait: Duration::from_secs(15),
        }
    }
}

impl RetryPolicy {
    /// A single attempt, no waiting
    #[cfg(test)]
    pub(crate) fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            multiplier: 0.0,
            min_wait: Duration::ZERO,
            max_wait: Duration::ZERO,
        }
    }

    /// Calculate the wait after a failed attempt
    pub fn delay_after_attempt(&self, attempt: u32) -> Duration {
        let exp = 2f64.powi(attempt.saturating_sub(1).min(63) as i32);
        let secs = (self.multiplier * exp).max(0.0);
        let delay = Duration::try_from_secs_f64(secs).unwrap_or(self.max_wait);
        delay.clamp(self.min_wait, self.max_wait.max(self.min_wait))
    }

    /// Run `operation` until it succeeds, fails logically, or attempts run out
    ///
    /// Logical errors come back as `Ok(Err(_))` so callers can decide how to
    /// degrade; only exhausted transport failures become [`CategorizeError`].
    pub async fn run<T, F, Fut>(
        &self,
        mut operation: F,
    ) -> Result<Result<T, LlmError>, CategorizeError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, LlmError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(Ok(value)),
                Err(e) if !e.is_retryable() => return Ok(Err(e)),
                Err(e) if attempt >= max_attempts => {
                    return Err(CategorizeError::RetriesExhausted {
                        attempts: attempt,
                        source: e,
                    });
                }
                Err(e) => {
                    let delay = self.delay_after_attempt(attempt);
                    warn!(
                        attempt,
                        max_attempts,
                        "Transport error ({}), retrying in {:?}",
                        e,
                        delay
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
