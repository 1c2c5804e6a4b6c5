//! Stream Aggregator
//!
//! Folds streamed chunks into one logical response. Content and reasoning
//! fragments are concatenated in arrival order; the tool-call list is taken
//! from the last chunk that carries one; usage reports are summed.

use crate::types::{ChatChunk, ChatResponse, FinishReason, ToolCall, Usage};

#[derive(Debug, Default)]
pub struct StreamAggregator {
    content: String,
    reasoning: String,
    tool_calls: Option<Vec<ToolCall>>,
    usage: Option<Usage>,
    finish_reason: Option<FinishReason>,
    chunk_count: usize,
}

impl StreamAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one chunk in. Returns `true` for the first chunk observed.
    pub fn process_chunk(&mut self, chunk: &ChatChunk) -> bool {
        self.chunk_count += 1;

        if let Some(delta) = &chunk.content {
            self.content.push_str(delta);
        }
        if let Some(delta) = &chunk.reasoning {
            self.reasoning.push_str(delta);
        }
        if let Some(calls) = &chunk.tool_calls {
            tracing::debug!(count = calls.len(), "stream carried tool calls");
            self.tool_calls = Some(calls.clone());
        }
        if let Some(usage) = &chunk.usage {
            let total = self.usage.get_or_insert_with(Usage::default);
            *total += usage;
        }
        if chunk.finish_reason.is_some() {
            self.finish_reason = chunk.finish_reason.clone();
        }

        self.chunk_count == 1
    }

    pub const fn is_started(&self) -> bool {
        self.chunk_count > 0
    }

    pub const fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    /// Content accumulated so far.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// The aggregated response, as if the provider had answered in one piece.
    pub fn into_response(self) -> ChatResponse {
        let tool_calls = self.tool_calls.filter(|calls| !calls.is_empty());
        let finish_reason = self.finish_reason.or_else(|| {
            Some(if tool_calls.is_some() {
                FinishReason::ToolCalls
            } else {
                FinishReason::Stop
            })
        });

        ChatResponse {
            content: self.content,
            tool_calls,
            usage: self.usage,
            thinking: if self.reasoning.is_empty() {
                None
            } else {
                Some(self.reasoning)
            },
            finish_reason,
            ..Default::default()
        }
    }
}

impl From<ChatResponse> for ChatChunk {
    /// One chunk carrying a whole response, for providers that cannot stream.
    fn from(response: ChatResponse) -> Self {
        ChatChunk {
            content: (!response.content.is_empty()).then_some(response.content),
            reasoning: response.thinking,
            tool_calls: response.tool_calls.filter(|calls| !calls.is_empty()),
            usage: response.usage,
            finish_reason: response.finish_reason,
        }
    }
}
