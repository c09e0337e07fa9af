//! Bounded exponential-backoff retry
//!
//! Every outbound model and search call goes through a [`RetryPolicy`].
//! After failed attempt `i` (0-based) the policy sleeps `2^i * base_delay`;
//! there is no jitter and no budget shared between calls.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{ResearchError, Result};

/// Default number of retries after the first attempt
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Base delay for exponential backoff (milliseconds)
pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;

/// Retry budget for one call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; the operation runs at most `max_retries + 1` times
    pub max_retries: u32,
    /// Delay before the first retry; doubles for each subsequent one
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// Set a custom base delay
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Total number of attempts this policy allows.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Backoff after the failed attempt with index `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// budget runs out. Only the last error is returned.
    ///
    /// Both the operation and the backoff sleep race `cancel`; a cancelled
    /// token ends the call with [`ResearchError::Cancelled`].
    pub async fn execute<T, F, Fut>(
        &self,
        label: &str,
        cancel: &CancellationToken,
        mut op: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(ResearchError::Cancelled);
            }

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ResearchError::Cancelled),
                result = op() => result,
            };

            let err = match outcome {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(label, attempts = attempt + 1, "Request succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) => e,
            };

            if !err.is_retryable() || attempt >= self.max_retries {
                if attempt > 0 {
                    warn!(label, attempts = attempt + 1, error = %err, "Giving up after retries");
                }
                return Err(err);
            }

            let delay = self.delay_for(attempt);
            warn!(
                label,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Request failed, will retry"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ResearchError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries).with_base_delay(Duration::from_millis(1))
    }

    fn transient() -> ResearchError {
        ResearchError::ServerError {
            provider: "test".to_string(),
            status: 503,
            body: "unavailable".to_string(),
        }
    }

    #[test]
    fn test_backoff_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(1), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(4000));
        assert_eq!(policy.max_attempts(), 3);
    }

    #[tokio::test]
    async fn test_succeeds_after_k_failures() {
        let calls = AtomicU32::new(0);
        let calls_ref = &calls;
        let token = CancellationToken::new();

        let result = fast(3)
            .execute("flaky", &token, move || async move {
                let n = calls_ref.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(transient())
                } else {
                    Ok(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_budget_returns_last_error() {
        let calls = AtomicU32::new(0);
        let calls_ref = &calls;
        let token = CancellationToken::new();

        let result: Result<()> = fast(2)
            .execute("down", &token, move || async move {
                let n = calls_ref.fetch_add(1, Ordering::SeqCst);
                Err(ResearchError::ServerError {
                    provider: "test".to_string(),
                    status: 500 + n as u16,
                    body: String::new(),
                })
            })
            .await;

        assert!(matches!(
            result,
            Err(ResearchError::ServerError { status: 502, .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_rate_limit_surfaces_after_retries() {
        let token = CancellationToken::new();
        let result: Result<()> = fast(1)
            .execute("limited", &token, || async {
                Err(ResearchError::RateLimited {
                    provider: "perplexity".to_string(),
                })
            })
            .await;

        assert!(result.unwrap_err().is_rate_limited());
    }

    #[tokio::test]
    async fn test_non_retryable_stops_immediately() {
        let calls = AtomicU32::new(0);
        let calls_ref = &calls;
        let token = CancellationToken::new();

        let result: Result<()> = fast(3)
            .execute("unauthorized", &token, move || async move {
                calls_ref.fetch_add(1, Ordering::SeqCst);
                Err(ResearchError::Unauthorized {
                    provider: "gemini".to_string(),
                })
            })
            .await;

        assert!(matches!(result, Err(ResearchError::Unauthorized { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancelled_token_skips_operation() {
        let calls = AtomicU32::new(0);
        let calls_ref = &calls;
        let token = CancellationToken::new();
        token.cancel();

        let result = fast(2)
            .execute("cancelled", &token, move || async move {
                calls_ref.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(ResearchError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_during_backoff() {
        let token = CancellationToken::new();
        let policy = RetryPolicy::new(2).with_base_delay(Duration::from_secs(60));

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let result: Result<()> = policy
            .execute("slow", &token, || async { Err(transient()) })
            .await;

        assert!(matches!(result, Err(ResearchError::Cancelled)));
    }
}
