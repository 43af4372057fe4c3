//! Bounded exponential backoff for external calls
//!
//! Wraps `backon` so synthesis and publishing share one retry policy shape:
//! only errors whose category is retryable are retried, every attempt is
//! counted, and the last error is returned once the bound is exhausted.

use backon::{ExponentialBuilder, Retryable};
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::debug;

use crate::constants::synthesis as defaults;
use crate::types::{Result, SyncError};

/// Retry bounds for one class of external call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub factor: f32,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: defaults::DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_millis(defaults::BASE_DELAY_MS),
            max_delay: Duration::from_secs(defaults::MAX_DELAY_SECS),
            factor: defaults::BACKOFF_FACTOR,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay_ms: u64, max_delay_secs: u64) -> Self {
        Self {
            max_retries,
            base_delay: Duration::from_millis(base_delay_ms),
            max_delay: Duration::from_secs(max_delay_secs),
            ..Self::default()
        }
    }

    /// Policy with no waiting, for tests and dry runs
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
            factor: 1.0,
            jitter: false,
        }
    }

    fn backoff(&self) -> ExponentialBuilder {
        let builder = ExponentialBuilder::default()
            .with_min_delay(self.base_delay)
            .with_max_delay(self.max_delay)
            .with_factor(self.factor)
            .with_max_times(self.max_retries as usize);
        if self.jitter {
            builder.with_jitter()
        } else {
            builder
        }
    }
}

/// Result of a retried call plus the number of attempts it took
#[derive(Debug)]
pub struct Attempted<T> {
    pub result: Result<T>,
    pub attempts: u32,
}

/// Run `call` until it succeeds, fails with a non-retryable error, or the
/// retry bound is exhausted.
pub async fn retry_call<T, F, Fut>(policy: &RetryPolicy, operation: &str, mut call: F) -> Attempted<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = AtomicU32::new(0);

    let result = (|| {
        attempts.fetch_add(1, Ordering::Relaxed);
        call()
    })
    .retry(policy.backoff())
    .when(|e: &SyncError| e.is_retryable())
    .notify(|e: &SyncError, delay: Duration| {
        debug!(
            operation,
            delay_ms = delay.as_millis() as u64,
            error = %e,
            "Retrying after backoff"
        );
    })
    .await;

    Attempted {
        result,
        attempts: attempts.load(Ordering::Relaxed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ErrorCategory, ExternalError};
    use std::sync::atomic::AtomicUsize;

    fn transient() -> SyncError {
        ExternalError::new(ErrorCategory::Transient, "overloaded").into()
    }

    #[test]
    fn test_default_policy_matches_documented_bounds() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.base_delay, Duration::from_millis(500));
        assert_eq!(policy.max_delay, Duration::from_secs(30));
        assert!(policy.jitter);
    }

    #[tokio::test]
    async fn test_retries_transient_until_success() {
        let calls = AtomicUsize::new(0);
        let outcome = retry_call(&RetryPolicy::immediate(3), "flaky", || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(transient())
            } else {
                Ok("done")
            }
        })
        .await;

        assert_eq!(outcome.result.unwrap(), "done");
        assert_eq!(outcome.attempts, 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_bound() {
        let outcome: Attempted<()> =
            retry_call(&RetryPolicy::immediate(2), "down", || async { Err(transient()) }).await;

        assert!(outcome.result.is_err());
        assert_eq!(outcome.attempts, 3);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_fast() {
        let outcome: Attempted<()> = retry_call(&RetryPolicy::immediate(5), "auth", || async {
            Err(ExternalError::new(ErrorCategory::Auth, "bad token").into())
        })
        .await;

        assert!(outcome.result.is_err());
        assert_eq!(outcome.attempts, 1);
    }
}
