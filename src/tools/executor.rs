//! Tool execution loop
//!
//! Turns the tool calls of one assistant message into tool-result messages,
//! one per call, in the order the provider emitted the calls.

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ToolRegistry, result_to_text};
use crate::error::{LlmError, ToolErrorKind};
use crate::middleware::{MiddlewareContext, MiddlewarePipeline, ToolErrorAction};
use crate::session::SessionEvents;
use crate::traits::ChatProvider;
use crate::types::{ChatMessage, ToolCall};

/// How requested tool calls are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolExecutionMode {
    /// Execute immediately.
    #[default]
    Auto,
    /// Never execute; the turn ends and the proposed calls are returned.
    DryRun,
    /// Execute only calls approved by `on_confirm_tool_call`.
    Confirm,
}

pub(crate) struct ToolExecutor<'a> {
    pub registry: &'a ToolRegistry,
    pub pipeline: &'a MiddlewarePipeline,
    pub ctx: &'a MiddlewareContext,
    pub events: &'a SessionEvents,
    pub provider: &'a dyn ChatProvider,
    pub mode: ToolExecutionMode,
    pub max_retries: u32,
    pub validate_arguments: bool,
    pub parallel: bool,
}

impl ToolExecutor<'_> {
    /// One result message per call, in call order. An error means a
    /// middleware answered `Stop`; in parallel mode the sibling calls still
    /// in flight are dropped.
    pub async fn execute_all(&self, calls: &[ToolCall]) -> Result<Vec<ChatMessage>, LlmError> {
        if self.parallel && calls.len() > 1 {
            // Results come back in input order regardless of completion order.
            try_join_all(calls.iter().map(|call| self.execute_one(call))).await
        } else {
            let mut messages = Vec::with_capacity(calls.len());
            for call in calls {
                messages.push(self.execute_one(call).await?);
            }
            Ok(messages)
        }
    }

    async fn execute_one(&self, call: &ToolCall) -> Result<ChatMessage, LlmError> {
        if self.mode == ToolExecutionMode::Confirm && !self.events.confirm_tool_call(call) {
            tracing::debug!(tool = call.name(), call_id = %call.id, "tool call declined");
            let declined =
                LlmError::tool_error(call.name(), ToolErrorKind::Declined, "declined by the user");
            return Ok(self.error_message(call, &declined));
        }

        let mut retries = 0;
        loop {
            self.events.tool_call_start(call);
            match self.invoke(call).await {
                Ok(text) => {
                    self.events.tool_call_end(call, &text);
                    return Ok(self
                        .provider
                        .format_tool_result_message(&call.id, text, false));
                }
                Err(error) => {
                    tracing::debug!(
                        tool = call.name(),
                        call_id = %call.id,
                        "tool call failed: {}",
                        error
                    );
                    self.events.tool_call_error(call, &error);
                    match self.pipeline.resolve_tool_error(self.ctx, call, &error).await {
                        Some(ToolErrorAction::Stop) => return Err(error),
                        Some(ToolErrorAction::Retry) if retries < self.max_retries => {
                            retries += 1;
                            tracing::debug!(tool = call.name(), retries, "retrying tool call");
                        }
                        _ => return Ok(self.error_message(call, &error)),
                    }
                }
            }
        }
    }

    async fn invoke(&self, call: &ToolCall) -> Result<String, LlmError> {
        let name = call.name();
        let tool = self.registry.get(name).ok_or_else(|| {
            LlmError::tool_error(name, ToolErrorKind::NotFound, "no tool registered with this name")
        })?;

        let raw = call.function.arguments.trim();
        let args: Value = if raw.is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(raw).map_err(|e| {
                LlmError::tool_error(name, ToolErrorKind::InvalidArguments, e.to_string())
            })?
        };

        if self.validate_arguments {
            tool.validate_arguments(&args)?;
        }

        let output = tool.invoke(args).await.map_err(|e| match e {
            LlmError::ToolError { .. } => e,
            other => LlmError::tool_error(name, ToolErrorKind::Execution, other.to_string()),
        })?;
        Ok(result_to_text(output))
    }

    fn error_message(&self, call: &ToolCall, error: &LlmError) -> ChatMessage {
        let content = serde_json::json!({ "error": error.to_string() }).to_string();
        self.provider.format_tool_result_message(&call.id, content, true)
    }
}
