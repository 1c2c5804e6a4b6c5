//! Session middleware
//!
//! Middleware observes and intercepts every provider round trip of a session:
//! `on_request` may rewrite the outgoing message copies or abort, `on_response`
//! may replace the response, and `on_tool_call_error` is the one hook that can
//! steer the tool loop.
//!
//! A session runs global middleware (see [`crate::config`]) first, then its own,
//! in registration order.

mod pipeline;
pub mod presets;

use std::collections::HashMap;

use async_trait::async_trait;

pub use pipeline::MiddlewarePipeline;
pub use presets::{CostGuardMiddleware, PiiMaskingMiddleware, UsageLoggingMiddleware};

use crate::error::LlmError;
use crate::types::{ChatMessage, ChatResponse, ToolCall};

/// Loop-control answer from [`Middleware::on_tool_call_error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolErrorAction {
    /// Abort the turn and return the error to the caller.
    Stop,
    /// Feed the error back to the model as an error-flagged tool result.
    Continue,
    /// Invoke the same call again, within the session's retry budget.
    Retry,
}

/// Per-round view handed to middleware hooks.
///
/// `messages` is a copy of what will be sent; history itself is never exposed.
#[derive(Debug, Clone)]
pub struct MiddlewareContext {
    pub request_id: String,
    pub provider: String,
    pub model: String,
    /// Zero-based round within the current `ask`/`stream` call.
    pub round: usize,
    pub streaming: bool,
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Free-form values middlewares may share within one round.
    pub metadata: HashMap<String, serde_json::Value>,
}

impl MiddlewareContext {
    pub fn new(
        request_id: impl Into<String>,
        provider: impl Into<String>,
        model: impl Into<String>,
        messages: Vec<ChatMessage>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            provider: provider.into(),
            model: model.into(),
            round: 0,
            streaming: false,
            messages,
            temperature: None,
            max_tokens: None,
            metadata: HashMap::new(),
        }
    }
}

#[async_trait]
pub trait Middleware: Send + Sync {
    /// Name used in logs and in `MiddlewareAbort` errors.
    fn name(&self) -> &str;

    /// Runs before every provider call. Errors abort the turn.
    async fn on_request(&self, _ctx: &mut MiddlewareContext) -> Result<(), LlmError> {
        Ok(())
    }

    /// Runs after every provider call; the returned response replaces the input.
    async fn on_response(
        &self,
        _ctx: &MiddlewareContext,
        response: ChatResponse,
    ) -> Result<ChatResponse, LlmError> {
        Ok(response)
    }

    /// Runs when a tool call fails. `None` means no opinion.
    async fn on_tool_call_error(
        &self,
        _ctx: &MiddlewareContext,
        _call: &ToolCall,
        _error: &LlmError,
    ) -> Option<ToolErrorAction> {
        None
    }
}
