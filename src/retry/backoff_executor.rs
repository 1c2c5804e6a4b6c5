//! Backoff-based retry executor
//!
//! Wraps the `backoff` crate's exponential policy with an attempt cap, so a
//! provider call never retries forever even when `max_elapsed_time` is unset.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use backoff::ExponentialBackoff;
use backoff::ExponentialBackoffBuilder;

use crate::error::LlmError;

#[derive(Debug, Clone)]
pub struct BackoffRetryExecutor {
    backoff: ExponentialBackoff,
    max_attempts: u32,
    retry_timeouts: bool,
}

impl Default for BackoffRetryExecutor {
    fn default() -> Self {
        Self::new(3)
    }
}

impl BackoffRetryExecutor {
    /// Exponential backoff (1s initial, x2, capped at 60s) with at most
    /// `max_attempts` attempts.
    pub fn new(max_attempts: u32) -> Self {
        let backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(1000))
            .with_max_interval(Duration::from_secs(60))
            .with_multiplier(2.0)
            .with_max_elapsed_time(Some(Duration::from_secs(300)))
            .build();
        Self::with_backoff(backoff, max_attempts)
    }

    pub fn with_backoff(backoff: ExponentialBackoff, max_attempts: u32) -> Self {
        Self {
            backoff,
            max_attempts: max_attempts.max(1),
            retry_timeouts: false,
        }
    }

    pub const fn with_retry_timeouts(mut self, retry_timeouts: bool) -> Self {
        self.retry_timeouts = retry_timeouts;
        self
    }

    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn is_transient(&self, error: &LlmError) -> bool {
        error.is_retryable() || (self.retry_timeouts && matches!(error, LlmError::TimeoutError(_)))
    }

    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T, LlmError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, LlmError>>,
    {
        let counter = AtomicU32::new(0);
        let attempts = &counter;
        let operation = &operation;
        let max_attempts = self.max_attempts;

        backoff::future::retry(self.backoff.clone(), move || async move {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            match operation().await {
                Ok(value) => Ok(value),
                Err(error) if attempt < max_attempts && self.is_transient(&error) => {
                    tracing::debug!(attempt, max_attempts, "transient provider error: {}", error);
                    Err(backoff::Error::transient(error))
                }
                Err(error) => Err(backoff::Error::permanent(error)),
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn fast(max_attempts: u32) -> BackoffRetryExecutor {
        let backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(1))
            .with_max_interval(Duration::from_millis(5))
            .with_randomization_factor(0.0)
            .build();
        BackoffRetryExecutor::with_backoff(backoff, max_attempts)
    }

    #[tokio::test]
    async fn stops_at_attempt_cap() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result: Result<(), LlmError> = fast(3)
            .execute(|| {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err(LlmError::RateLimitError("slow down".into()))
                }
            })
            .await;

        assert!(matches!(result, Err(LlmError::RateLimitError(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn recovers_after_transient_failure() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result = fast(3)
            .execute(|| {
                let c = c.clone();
                async move {
                    if c.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(LlmError::api_error(502, "test", "bad gateway"))
                    } else {
                        Ok(7)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn permanent_error_is_returned_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result: Result<(), LlmError> = fast(5)
            .execute(|| {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err(LlmError::api_error(400, "test", "bad request"))
                }
            })
            .await;

        assert!(matches!(result, Err(LlmError::ApiError { code: 400, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
