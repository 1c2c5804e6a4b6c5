//! Error Handling Module
//!
//! One error type (`LlmError`) covers every failure the chat engine can surface:
//! configuration problems, capability mismatches, tool failures, loop-guard trips,
//! provider errors (transient or permanent) and middleware aborts.
//!
//! # Example
//!
//! ```rust,ignore
//! use confab::error::{ErrorCategory, LlmError};
//!
//! let error = LlmError::api_error(503, "openai", "unavailable");
//! assert_eq!(error.category(), ErrorCategory::Transient);
//! assert!(error.is_retryable());
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Broad classification used for retry and propagation decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Missing or invalid setup. Never retried.
    Configuration,
    /// The model lacks a requested feature.
    Capability,
    /// Tool lookup, argument or handler failure.
    Tool,
    /// Too many tool-call round trips.
    LoopGuard,
    /// Rate limiting, 5xx and similar; retryable.
    Transient,
    /// Bad request, authentication, parse failures; surfaced immediately.
    Permanent,
    /// Aborted by a middleware.
    Policy,
    /// Bugs and invariant violations.
    Internal,
}

/// What went wrong inside a tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    /// No registered tool matches the requested name.
    NotFound,
    /// The argument string is not valid JSON or does not match the schema.
    InvalidArguments,
    /// The handler itself failed.
    Execution,
    /// The caller declined the call in confirm mode.
    Declined,
}

impl fmt::Display for ToolErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotFound => "not found",
            Self::InvalidArguments => "invalid arguments",
            Self::Execution => "execution failed",
            Self::Declined => "declined",
        };
        f.write_str(s)
    }
}

/// Errors produced by the chat engine and its collaborators.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    /// Missing or invalid provider/session setup
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The bound model does not support a feature the request needs
    #[error("Capability error: model '{model}' (provider '{provider}') does not support {feature}")]
    CapabilityError {
        provider: String,
        model: String,
        feature: String,
    },

    /// Tool lookup, argument parsing or handler failure
    #[error("Tool error in '{tool}' ({kind}): {message}")]
    ToolError {
        tool: String,
        kind: ToolErrorKind,
        message: String,
    },

    /// Maximum number of tool-call round trips exceeded
    #[error(
        "Loop guard: model '{model}' (provider '{provider}') exceeded {limit} tool-call round trips"
    )]
    LoopGuardError {
        provider: String,
        model: String,
        limit: usize,
    },

    /// Rate limit exceeded
    #[error("Rate limit exceeded: {0}")]
    RateLimitError(String),

    /// Provider API error with status code
    #[error("API error {code} from '{provider}': {message}")]
    ApiError {
        code: u16,
        provider: String,
        message: String,
    },

    /// Authentication failure
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// Request timed out
    #[error("Timeout error: {0}")]
    TimeoutError(String),

    /// Invalid request parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Response could not be parsed
    #[error("Parse error: {0}")]
    ParseError(String),

    /// JSON (de)serialization failure
    #[error("JSON error: {0}")]
    JsonError(String),

    /// Streaming failure
    #[error("Stream error: {0}")]
    StreamError(String),

    /// A middleware aborted the turn
    #[error("Middleware '{middleware}' aborted the request: {message}")]
    MiddlewareAbort { middleware: String, message: String },

    /// The provider does not implement the operation
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl LlmError {
    /// Create an API error.
    pub fn api_error(code: u16, provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ApiError {
            code,
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a tool error.
    pub fn tool_error(
        tool: impl Into<String>,
        kind: ToolErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self::ToolError {
            tool: tool.into(),
            kind,
            message: message.into(),
        }
    }

    /// Create a capability error.
    pub fn capability(
        provider: impl Into<String>,
        model: impl Into<String>,
        feature: impl Into<String>,
    ) -> Self {
        Self::CapabilityError {
            provider: provider.into(),
            model: model.into(),
            feature: feature.into(),
        }
    }

    /// Create a middleware abort.
    pub fn middleware_abort(middleware: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MiddlewareAbort {
            middleware: middleware.into(),
            message: message.into(),
        }
    }

    /// Classify this error.
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::ConfigurationError(_) => ErrorCategory::Configuration,
            Self::CapabilityError { .. } => ErrorCategory::Capability,
            Self::ToolError { .. } => ErrorCategory::Tool,
            Self::LoopGuardError { .. } => ErrorCategory::LoopGuard,
            Self::RateLimitError(_) => ErrorCategory::Transient,
            Self::ApiError { code, .. } => {
                if is_transient_status(*code) {
                    ErrorCategory::Transient
                } else {
                    ErrorCategory::Permanent
                }
            }
            Self::AuthenticationError(_)
            | Self::TimeoutError(_)
            | Self::InvalidParameter(_)
            | Self::ParseError(_)
            | Self::JsonError(_)
            | Self::StreamError(_)
            | Self::UnsupportedOperation(_) => ErrorCategory::Permanent,
            Self::MiddlewareAbort { .. } => ErrorCategory::Policy,
            Self::InternalError(_) => ErrorCategory::Internal,
        }
    }

    /// Whether a retry executor may re-issue the request.
    ///
    /// Timeouts are not retryable by default; a `RetryPolicy` can opt in.
    pub const fn is_retryable(&self) -> bool {
        matches!(self.category(), ErrorCategory::Transient)
    }

    /// Tool errors are the only non-fatal kind; everything else ends the turn.
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::ToolError { .. })
    }

    /// Status code for HTTP-derived errors.
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::ApiError { code, .. } => Some(*code),
            Self::RateLimitError(_) => Some(429),
            _ => None,
        }
    }
}

const fn is_transient_status(code: u16) -> bool {
    matches!(code, 408 | 409 | 425 | 429 | 500..=599)
}

/// Map a raw HTTP failure to a typed error.
///
/// Provider implementations call this so that retry decisions are made on the
/// error variant, not on ad-hoc status checks.
pub fn classify_http_status(provider: &str, status: u16, body: &str) -> LlmError {
    let body_sample: String = body.chars().take(200).collect();
    match status {
        429 => LlmError::RateLimitError(format!(
            "provider={provider} http=429 body_sample={body_sample}"
        )),
        401 | 403 => LlmError::AuthenticationError(format!(
            "provider={provider} http={status} body_sample={body_sample}"
        )),
        400 | 404 | 413 | 415 | 422 => LlmError::InvalidParameter(format!(
            "provider={provider} http={status} body_sample={body_sample}"
        )),
        _ => {
            let message = if body_sample.trim().is_empty() {
                "api error".to_string()
            } else {
                body_sample
            };
            LlmError::api_error(status, provider, message)
        }
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for LlmError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::InvalidParameter(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_are_retryable() {
        assert!(LlmError::RateLimitError("slow down".into()).is_retryable());
        assert!(LlmError::api_error(503, "openai", "unavailable").is_retryable());
        assert!(!LlmError::api_error(400, "openai", "bad").is_retryable());
        assert!(!LlmError::AuthenticationError("no".into()).is_retryable());
        assert!(!LlmError::TimeoutError("slow".into()).is_retryable());
    }

    #[test]
    fn only_tool_errors_are_non_fatal() {
        let tool = LlmError::tool_error("get_weather", ToolErrorKind::Execution, "boom");
        assert!(!tool.is_fatal());
        assert!(
            LlmError::LoopGuardError {
                provider: "p".into(),
                model: "m".into(),
                limit: 5
            }
            .is_fatal()
        );
    }

    #[test]
    fn errors_carry_actionable_context() {
        let err = LlmError::capability("openai", "gpt-3.5-turbo", "vision");
        let text = err.to_string();
        assert!(text.contains("gpt-3.5-turbo"));
        assert!(text.contains("openai"));
        assert!(text.contains("vision"));

        let err = LlmError::tool_error("get_weather", ToolErrorKind::NotFound, "unknown tool");
        assert!(err.to_string().contains("get_weather"));
    }

    #[test]
    fn classify_http_status_maps_common_codes() {
        assert!(matches!(
            classify_http_status("anthropic", 429, ""),
            LlmError::RateLimitError(_)
        ));
        assert!(matches!(
            classify_http_status("anthropic", 401, "bad key"),
            LlmError::AuthenticationError(_)
        ));
        assert!(matches!(
            classify_http_status("anthropic", 400, "{}"),
            LlmError::InvalidParameter(_)
        ));
        match classify_http_status("anthropic", 502, "") {
            LlmError::ApiError { code, message, .. } => {
                assert_eq!(code, 502);
                assert_eq!(message, "api error");
            }
            other => panic!("unexpected error variant: {other:?}"),
        }
    }
}
