//! Chat response and stream chunk types

use serde::{Deserialize, Serialize};

use super::message::ChatMessage;
use super::tools::ToolCall;
use super::usage::Usage;

/// Reason why the model stopped generating tokens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Other(String),
}

/// A provider's answer for one request, and the session's answer for one turn.
///
/// The session fills `parsed` (structured output) and accumulates `usage`
/// across the tool round trips of a turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Final text content.
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    /// Reasoning / thinking text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// When the response was received, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<chrono::DateTime<chrono::Utc>>,
    /// Structured-output parse result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parsed: Option<serde_json::Value>,
}

impl ChatResponse {
    /// Create a text response
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    /// Create a response that only requests tool calls
    pub fn with_tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: Some(calls),
            finish_reason: Some(FinishReason::ToolCalls),
            ..Default::default()
        }
    }

    pub fn content_text(&self) -> Option<&str> {
        if self.content.is_empty() {
            None
        } else {
            Some(&self.content)
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls.as_ref().is_some_and(|calls| !calls.is_empty())
    }

    pub fn tool_calls(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or_default()
    }

    /// The assistant message this response becomes in history.
    pub fn to_assistant_message(&self) -> ChatMessage {
        let mut builder = ChatMessage::assistant(self.content.clone())
            .with_tool_calls(self.tool_calls.clone().unwrap_or_default());
        if let Some(thinking) = &self.thinking {
            builder = builder.with_reasoning(thinking.clone());
        }
        builder.build()
    }
}

/// A partial piece of a streamed response.
///
/// Any subset of fields may be present. `tool_calls`, when present, is the
/// complete set assembled so far; the last chunk carrying it wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatChunk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

impl ChatChunk {
    pub fn content(delta: impl Into<String>) -> Self {
        Self {
            content: Some(delta.into()),
            ..Default::default()
        }
    }

    pub fn reasoning(delta: impl Into<String>) -> Self {
        Self {
            reasoning: Some(delta.into()),
            ..Default::default()
        }
    }

    pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: Some(calls),
            finish_reason: Some(FinishReason::ToolCalls),
            ..Default::default()
        }
    }

    pub fn usage(usage: Usage) -> Self {
        Self {
            usage: Some(usage),
            ..Default::default()
        }
    }
}
