//! Retry facade
//!
//! `RetryOptions` selects a backend; the session attaches one per session and
//! wraps every provider call in [`maybe_retry`].

use super::{BackoffRetryExecutor, RetryExecutor, RetryPolicy};
use crate::error::LlmError;

/// Retry backend selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryBackend {
    /// `backoff` crate executor (default)
    #[default]
    Backoff,
    /// Simple policy-based executor
    Policy,
}

/// Unified retry options
#[derive(Debug, Clone, Default)]
pub struct RetryOptions {
    pub backend: RetryBackend,
    /// Backoff executor override (Backoff backend only).
    pub backoff_executor: Option<BackoffRetryExecutor>,
    /// Policy override (Policy backend only).
    pub policy: Option<RetryPolicy>,
}

impl RetryOptions {
    /// Backoff backend with `max_attempts` attempts.
    pub fn backoff(max_attempts: u32) -> Self {
        Self {
            backend: RetryBackend::Backoff,
            backoff_executor: Some(BackoffRetryExecutor::new(max_attempts)),
            policy: None,
        }
    }

    pub fn with_backoff_executor(mut self, executor: BackoffRetryExecutor) -> Self {
        self.backend = RetryBackend::Backoff;
        self.backoff_executor = Some(executor);
        self
    }

    pub fn policy_default() -> Self {
        Self {
            backend: RetryBackend::Policy,
            policy: Some(RetryPolicy::default()),
            ..Default::default()
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.backend = RetryBackend::Policy;
        self.policy = Some(policy);
        self
    }

    /// Set max attempts on whichever backend is selected.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        match self.backend {
            RetryBackend::Policy => {
                self.policy = Some(self.policy.unwrap_or_default().with_max_attempts(attempts));
            }
            RetryBackend::Backoff => {
                self.backoff_executor = Some(BackoffRetryExecutor::new(attempts));
            }
        }
        self
    }
}

/// Retry with explicit options
pub async fn retry_with<F, Fut, T>(operation: F, options: &RetryOptions) -> Result<T, LlmError>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, LlmError>>,
{
    match options.backend {
        RetryBackend::Backoff => match options.backoff_executor.as_ref() {
            Some(executor) => executor.execute(operation).await,
            None => BackoffRetryExecutor::default().execute(operation).await,
        },
        RetryBackend::Policy => {
            let policy = options.policy.clone().unwrap_or_default();
            RetryExecutor::new(policy).execute(operation).await
        }
    }
}

/// Retry only when options are provided.
pub async fn maybe_retry<F, Fut, T>(
    options: Option<&RetryOptions>,
    operation: F,
) -> Result<T, LlmError>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, LlmError>>,
{
    match options {
        Some(opts) => retry_with(operation, opts).await,
        None => operation().await,
    }
}
