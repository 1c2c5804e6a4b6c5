//! Provider contract
//!
//! A provider maps the unified [`ChatRequest`] to a vendor API and back. The
//! engine only relies on the methods below; wire formats live in provider crates.

use async_trait::async_trait;

use crate::error::LlmError;
use crate::streaming::ChatStream;
use crate::types::{ChatMessage, ChatRequest, ChatResponse, Pricing};

/// Static capability metadata for the models a provider serves.
///
/// Implementations must not touch the network.
pub trait ModelCapabilities: Send + Sync {
    fn supports_vision(&self, model: &str) -> bool;
    fn supports_tools(&self, model: &str) -> bool;
    fn supports_structured_output(&self, model: &str) -> bool;
    fn supports_reasoning(&self, model: &str) -> bool;

    /// Context window in tokens, when known.
    fn context_window(&self, _model: &str) -> Option<u32> {
        None
    }

    /// Token prices, when known.
    fn pricing(&self, _model: &str) -> Option<Pricing> {
        None
    }
}

#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Stable provider id used in errors and logs (e.g. "openai").
    fn id(&self) -> &str;

    /// Single request/response call.
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LlmError>;

    /// Streaming call. Providers without streaming keep the default.
    async fn stream(&self, request: ChatRequest) -> Result<ChatStream, LlmError> {
        let _ = request;
        Err(LlmError::UnsupportedOperation(format!(
            "provider '{}' does not support streaming",
            self.id()
        )))
    }

    fn supports_streaming(&self) -> bool {
        false
    }

    fn capabilities(&self) -> &dyn ModelCapabilities;

    /// Build the message that carries a tool result back to the model.
    fn format_tool_result_message(
        &self,
        call_id: &str,
        content: String,
        is_error: bool,
    ) -> ChatMessage {
        ChatMessage::tool_result(call_id, content)
            .with_error(is_error)
            .build()
    }
}
