//! Exponential-backoff retry for transient directory failures.

use std::future::Future;
use std::time::Duration;

use crate::errors::{IdmanError, IdmanResult};

/// Retry tuning shared by the executor layers.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Retries after the initial attempt. Default: 2.
    pub max_retries: u32,
    /// First backoff delay. Default: 1 s.
    pub base_delay: Duration,
    /// Backoff cap. Default: 60 s.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (0-based): base * 2^attempt, capped.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        exp.min(self.max_delay)
    }
}

/// Whether an error is worth retrying.
///
/// Rate limits, service unavailability, timeouts, and all transport-level
/// failures are transient; everything else is a hard failure.
pub fn is_transient(error: &IdmanError) -> bool {
    match error {
        IdmanError::Execution(e) => matches!(
            e,
            crate::errors::ExecutionError::RateLimited { .. }
                | crate::errors::ExecutionError::ServiceUnavailable { .. }
                | crate::errors::ExecutionError::Timeout { .. }
        ),
        IdmanError::Network(_) => true,
        _ => false,
    }
}

/// Run `op`, retrying transient failures with exponential backoff.
///
/// Non-transient errors and exhausted retries are returned to the caller.
pub async fn retry_with_backoff<T, F, Fut>(
    config: &RetryConfig,
    operation: &str,
    mut op: F,
) -> IdmanResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = IdmanResult<T>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if attempt >= config.max_retries || !is_transient(&error) {
                    return Err(error);
                }
                let delay = config.backoff_delay(attempt);
                tracing::debug!(
                    "retry: {operation} attempt {} failed ({}), backing off {:?}",
                    attempt + 1,
                    error.code(),
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ExecutionError, ValidationError};
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn backoff_doubles_and_caps() {
        let config = RetryConfig {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        };
        assert_eq!(config.backoff_delay(0), Duration::from_secs(1));
        assert_eq!(config.backoff_delay(1), Duration::from_secs(2));
        assert_eq!(config.backoff_delay(10), Duration::from_secs(60));
    }

    #[test]
    fn classifier_separates_transient_from_hard() {
        let transient: IdmanError = ExecutionError::RateLimited {
            operation: "x".to_string(),
        }
        .into();
        let hard: IdmanError = ValidationError::EntityNotFound {
            reference: "user:bob".to_string(),
        }
        .into();
        assert!(is_transient(&transient));
        assert!(!is_transient(&hard));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_are_retried_until_success() {
        let attempts = AtomicU32::new(0);
        let config = RetryConfig::default();
        let result: IdmanResult<u32> = retry_with_backoff(&config, "test", || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ExecutionError::ServiceUnavailable {
                        operation: "test".to_string(),
                    }
                    .into())
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn hard_errors_fail_fast() {
        let attempts = AtomicU32::new(0);
        let config = RetryConfig::default();
        let result: IdmanResult<()> = retry_with_backoff(&config, "test", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async {
                Err(ValidationError::EntityNotFound {
                    reference: "user:bob".to_string(),
                }
                .into())
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
