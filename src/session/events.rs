//! Session lifecycle callbacks
//!
//! Callbacks run synchronously at fixed points of the turn loop. Only
//! `on_confirm_tool_call` influences control flow.

use std::fmt;
use std::sync::Arc;

use crate::error::LlmError;
use crate::types::{ChatResponse, ToolCall};

pub type NewMessageCallback = Arc<dyn Fn() + Send + Sync>;
pub type EndMessageCallback = Arc<dyn Fn(&ChatResponse) + Send + Sync>;
pub type ToolCallCallback = Arc<dyn Fn(&ToolCall) + Send + Sync>;
pub type ToolCallEndCallback = Arc<dyn Fn(&ToolCall, &str) + Send + Sync>;
pub type ToolCallErrorCallback = Arc<dyn Fn(&ToolCall, &LlmError) + Send + Sync>;
pub type ConfirmToolCallCallback = Arc<dyn Fn(&ToolCall) -> bool + Send + Sync>;

#[derive(Clone, Default)]
pub struct SessionEvents {
    /// A new assistant message started (response received or first chunk).
    pub on_new_message: Option<NewMessageCallback>,
    /// An assistant message is complete, with the aggregated response.
    pub on_end_message: Option<EndMessageCallback>,
    pub on_tool_call_start: Option<ToolCallCallback>,
    /// Tool finished; receives the result text.
    pub on_tool_call_end: Option<ToolCallEndCallback>,
    pub on_tool_call_error: Option<ToolCallErrorCallback>,
    /// Gate for confirm mode. Without it every call is declined.
    pub on_confirm_tool_call: Option<ConfirmToolCallCallback>,
}

impl fmt::Debug for SessionEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionEvents")
            .field("on_new_message", &self.on_new_message.is_some())
            .field("on_end_message", &self.on_end_message.is_some())
            .field("on_tool_call_start", &self.on_tool_call_start.is_some())
            .field("on_tool_call_end", &self.on_tool_call_end.is_some())
            .field("on_tool_call_error", &self.on_tool_call_error.is_some())
            .field("on_confirm_tool_call", &self.on_confirm_tool_call.is_some())
            .finish()
    }
}

impl SessionEvents {
    pub(crate) fn new_message(&self) {
        if let Some(cb) = &self.on_new_message {
            cb();
        }
    }

    pub(crate) fn end_message(&self, response: &ChatResponse) {
        if let Some(cb) = &self.on_end_message {
            cb(response);
        }
    }

    pub(crate) fn tool_call_start(&self, call: &ToolCall) {
        if let Some(cb) = &self.on_tool_call_start {
            cb(call);
        }
    }

    pub(crate) fn tool_call_end(&self, call: &ToolCall, result: &str) {
        if let Some(cb) = &self.on_tool_call_end {
            cb(call, result);
        }
    }

    pub(crate) fn tool_call_error(&self, call: &ToolCall, error: &LlmError) {
        if let Some(cb) = &self.on_tool_call_error {
            cb(call, error);
        }
    }

    pub(crate) fn confirm_tool_call(&self, call: &ToolCall) -> bool {
        self.on_confirm_tool_call
            .as_ref()
            .is_some_and(|cb| cb(call))
    }
}
