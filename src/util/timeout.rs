//! Per-call timeouts for external collaborators
//!
//! Every generator and platform call goes through [`with_timeout`] so a hung
//! remote can never stall a run indefinitely.

use std::future::Future;
use std::time::Duration;

use crate::constants::{network as net_constants, publish, synthesis};
use crate::types::{Result, SyncError};

/// Timeouts for each class of external call
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Content generation call (default: 5 minutes)
    pub generation: Duration,
    /// Single platform mutation or snapshot read (default: 60 seconds)
    pub platform: Duration,
    /// Connection establishment (default: 30 seconds)
    pub connection: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            generation: Duration::from_secs(synthesis::CALL_TIMEOUT_SECS),
            platform: Duration::from_secs(publish::CALL_TIMEOUT_SECS),
            connection: Duration::from_secs(net_constants::CONNECTION_TIMEOUT_SECS),
        }
    }
}

impl TimeoutConfig {
    pub fn new(generation_secs: u64, platform_secs: u64) -> Self {
        Self {
            generation: Duration::from_secs(generation_secs),
            platform: Duration::from_secs(platform_secs),
            ..Self::default()
        }
    }
}

/// Execute an async operation with a timeout
///
/// Returns `SyncError::Timeout` if the operation doesn't complete in time.
/// Timeouts are retryable, so callers wrapping this in a retry loop get
/// another attempt.
pub async fn with_timeout<T, F>(timeout: Duration, future: F, operation_name: &str) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(SyncError::timeout(operation_name, timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_config_defaults() {
        let config = TimeoutConfig::default();
        assert_eq!(config.generation.as_secs(), 300);
        assert_eq!(config.platform.as_secs(), 60);
        assert_eq!(config.connection.as_secs(), 30);
    }

    #[tokio::test]
    async fn test_with_timeout_success() {
        let result = with_timeout(
            Duration::from_secs(1),
            async { Ok::<_, SyncError>(42) },
            "test operation",
        )
        .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_with_timeout_expires() {
        let result = with_timeout(
            Duration::from_millis(10),
            async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok::<_, SyncError>(42)
            },
            "slow operation",
        )
        .await;
        let err = result.unwrap_err();
        assert!(matches!(err, SyncError::Timeout { .. }));
        assert!(err.is_retryable());
    }
}
