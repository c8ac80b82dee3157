use std::future::Future;
use std::time::Duration;

use crate::error::Result;

/// Bounded retry for units of work the store aborted because of a
/// concurrent writer. Every other error is returned immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(25),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Never retries.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Runs `attempt` until it succeeds, fails with a non-retryable error, or
    /// the attempt budget is spent. Backoff grows linearly with the attempt.
    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut attempt: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut tries = 0;
        loop {
            tries += 1;
            match attempt().await {
                Err(e) if e.is_retryable() && tries < self.max_attempts => {
                    metrics::counter!("unit_of_work_retries_total", "operation" => operation)
                        .increment(1);
                    tracing::warn!(operation, attempt = tries, error = %e, "retrying after conflict");
                    tokio::time::sleep(self.backoff * tries).await;
                }
                result => return result,
            }
        }
    }
}
