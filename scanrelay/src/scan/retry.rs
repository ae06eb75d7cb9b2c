use std::future::Future;
use std::time::Duration;

use crate::config::ScanConfig;
use crate::error::{ErrorKind, Result};

/// Exponential backoff for rate-limited model calls.
///
/// The n-th retry waits `initial_backoff * 2^(n-1)`. Only
/// [`ErrorKind::RateLimit`] failures are retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_backoff: Duration) -> Self {
        Self {
            max_retries,
            initial_backoff,
        }
    }

    pub fn from_config(config: &ScanConfig) -> Self {
        Self::new(
            config.max_retries,
            Duration::from_millis(config.initial_backoff_ms),
        )
    }

    /// Delay before retry number `retry` (1-based).
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.initial_backoff.saturating_mul(factor)
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or the
    /// retry budget is spent. `op` receives the 1-based attempt number.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if e.kind() == ErrorKind::RateLimit && attempt <= self.max_retries => {
                    let delay = self.backoff_for(attempt);
                    tracing::warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Rate limited, retrying: {}",
                        e
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
