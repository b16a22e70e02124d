//! Bounded retry with exponential backoff.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// `2^n` seconds after the n-th failure (zero-based): 1s, 2s, 4s, ...
pub fn exponential_backoff(failed_attempt: u32) -> Duration {
    Duration::from_secs(1u64 << failed_attempt.min(16))
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: fn(u32) -> Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: exponential_backoff,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_RETRY_ATTEMPTS)
    }
}

/// Which attempt the operation is running as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    /// One-based
    pub number: u32,
    pub is_final: bool,
}

/// Run `op` until it succeeds, fails with a non-retryable error, or attempts run out.
pub async fn retry<T, E, F, Fut>(
    policy: RetryPolicy,
    mut op: F,
    is_retryable: impl Fn(&E) -> bool,
) -> Result<T, E>
where
    F: FnMut(Attempt) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut number = 1;
    loop {
        let attempt = Attempt {
            number,
            is_final: number >= policy.max_attempts,
        };
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if !attempt.is_final && is_retryable(&e) => {
                let delay = (policy.backoff)(number - 1);
                warn!(
                    attempt = number,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Retryable failure, backing off"
                );
                tokio::time::sleep(delay).await;
                number += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
