use std::{future::Future, time::Duration};
use tracing::{debug, error, warn};

use crate::errors::{GenError, Result};

/// `unit · 2^attempt`, attempt counted from 1.
pub fn exponential_backoff(unit: Duration, attempt: u32) -> Duration {
    unit.saturating_mul(2u32.saturating_pow(attempt))
}

/// What to do with a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryVerdict {
    /// Wait `backoff(base_delay, attempt)` and try again.
    Backoff,
    /// Wait one `base_delay` and try again.
    Pause,
    /// Give the error back to the caller untouched.
    Abort,
}

/// Bounded attempts with a pluggable backoff function.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff: fn(Duration, u32) -> Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            backoff: exponential_backoff,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            ..Default::default()
        }
    }

    pub fn delay_for(&self, verdict: RetryVerdict, attempt: u32) -> Option<Duration> {
        match verdict {
            RetryVerdict::Backoff => Some((self.backoff)(self.base_delay, attempt)),
            RetryVerdict::Pause => Some(self.base_delay),
            RetryVerdict::Abort => None,
        }
    }

    /// Run `operation` until it succeeds, `classify` aborts, or the attempts
    /// run out. Exhaustion wraps the last error in `GenerationExhausted`.
    pub async fn attempt<T, F, Fut, C>(
        &self,
        operation_name: &'static str,
        mut operation: F,
        classify: C,
    ) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
        C: Fn(&GenError) -> RetryVerdict,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!(
                operation = operation_name,
                attempt = attempt,
                max_attempts = max_attempts,
                "Starting attempt"
            );

            let error = match operation(attempt).await {
                Ok(result) => {
                    if attempt > 1 {
                        debug!(attempts = attempt, "Operation succeeded after retry");
                    }
                    return Ok(result);
                }
                Err(error) => error,
            };

            let verdict = classify(&error);
            let delay = match self.delay_for(verdict, attempt) {
                Some(delay) => delay,
                None => {
                    warn!(operation = operation_name, error = %error, "Operation aborted without retry");
                    return Err(error);
                }
            };

            if attempt >= max_attempts {
                error!(
                    monotonic_counter.upstream_exhausted = 1u64,
                    operation = operation_name,
                    attempts = attempt,
                    error = %error,
                    "Operation failed after maximum retry attempts"
                );
                return Err(GenError::GenerationExhausted {
                    operation: operation_name,
                    attempts: attempt,
                    source: Box::new(error),
                });
            }

            warn!(
                monotonic_counter.upstream_retries = 1u64,
                operation = operation_name,
                attempt = attempt,
                max_attempts = max_attempts,
                delay_ms = delay.as_millis() as u64,
                verdict = ?verdict,
                error = %error,
                "Operation failed, retrying"
            );

            pause(delay).await;
        }
    }
}

/// Pacing sleep between upstream calls.
#[tracing::instrument(level = "debug")]
pub async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

/// `units` multiples of the configured time unit.
pub fn units(unit: Duration, units: u32) -> Duration {
    unit.saturating_mul(units)
}
