//! Retry and timeout support for provider calls.

mod backoff_executor;
mod options;
mod policy;

use std::future::Future;
use std::time::Duration;

pub use backoff_executor::BackoffRetryExecutor;
pub use options::{RetryBackend, RetryOptions, maybe_retry, retry_with};
pub use policy::{RetryExecutor, RetryPolicy};

use crate::error::LlmError;

/// Run `future` under an optional deadline.
pub async fn with_timeout<T>(
    timeout: Option<Duration>,
    future: impl Future<Output = Result<T, LlmError>>,
) -> Result<T, LlmError> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, future).await.map_err(|_| {
            LlmError::TimeoutError(format!("request exceeded {}ms", limit.as_millis()))
        })?,
        None => future.await,
    }
}
