//! Policy-driven retries
//!
//! Exponential delays with optional jitter, decided per error by
//! [`RetryPolicy::should_retry`].

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::error::LlmError;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts in total, the first one included.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub use_jitter: bool,
    /// Jitter as a fraction of the delay, in `0.0..=1.0`.
    pub jitter_factor: f64,
    /// Treat `TimeoutError` as transient.
    pub retry_timeouts: bool,
    /// Replaces the default transient-error check when set.
    pub retry_condition: Option<fn(&LlmError) -> bool>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            use_jitter: true,
            jitter_factor: 0.1,
            retry_timeouts: false,
            retry_condition: None,
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exactly one attempt.
    pub fn none() -> Self {
        Self::default().with_max_attempts(1)
    }

    /// Zero is treated as one.
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = if max_attempts == 0 { 1 } else { max_attempts };
        self
    }

    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub const fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    pub const fn with_jitter(mut self, use_jitter: bool) -> Self {
        self.use_jitter = use_jitter;
        self
    }

    pub fn with_jitter_factor(mut self, factor: f64) -> Self {
        self.jitter_factor = factor.clamp(0.0, 1.0);
        self
    }

    pub const fn with_retry_timeouts(mut self, retry_timeouts: bool) -> Self {
        self.retry_timeouts = retry_timeouts;
        self
    }

    pub fn with_retry_condition(mut self, condition: fn(&LlmError) -> bool) -> Self {
        self.retry_condition = Some(condition);
        self
    }

    pub fn should_retry(&self, error: &LlmError) -> bool {
        match self.retry_condition {
            Some(condition) => condition(error),
            None => {
                error.is_retryable()
                    || (self.retry_timeouts && matches!(error, LlmError::TimeoutError(_)))
            }
        }
    }

    /// Delay before retry number `retry` (0-based), capped at `max_delay`.
    pub fn calculate_delay(&self, retry: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(retry.min(i32::MAX as u32) as i32);
        let millis = (self.initial_delay.as_millis() as f64 * factor)
            .min(self.max_delay.as_millis() as f64);
        let delay = Duration::from_millis(millis as u64);
        if self.use_jitter {
            self.jittered(delay)
        } else {
            delay
        }
    }

    fn jittered(&self, delay: Duration) -> Duration {
        let spread = delay.as_millis() as f64 * self.jitter_factor;
        if spread <= 0.0 {
            return delay;
        }
        let offset = rand::thread_rng().gen_range(-spread..=spread);
        Duration::from_millis((delay.as_millis() as f64 + offset).max(0.0) as u64)
    }
}

/// Runs an operation under a [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub const fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Call `operation` until it succeeds, fails permanently, or the attempts
    /// run out. The last error is returned.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, LlmError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LlmError>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };
            if attempt >= max_attempts || !self.policy.should_retry(&error) {
                return Err(error);
            }
            let delay = self.policy.calculate_delay(attempt - 1);
            tracing::debug!(
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                "retrying provider call: {}",
                error
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
