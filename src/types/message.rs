//! Chat message types

use serde::{Deserialize, Serialize};

use super::tools::ToolCall;

/// Message role
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    Developer,
    User,
    Assistant,
    Tool,
}

impl MessageRole {
    /// System and developer messages carry instructions and are sent first.
    pub const fn is_instruction(&self) -> bool {
        matches!(self, Self::System | Self::Developer)
    }
}

/// Where binary content lives.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MediaSource {
    /// Remote or data URL.
    Url { url: String },
    /// Inline base64 payload.
    Base64 { data: String },
}

/// One typed piece of multimodal content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        text: String,
    },
    Image {
        source: MediaSource,
        #[serde(skip_serializing_if = "Option::is_none")]
        media_type: Option<String>,
    },
    Audio {
        source: MediaSource,
        #[serde(skip_serializing_if = "Option::is_none")]
        media_type: Option<String>,
    },
    File {
        source: MediaSource,
        #[serde(skip_serializing_if = "Option::is_none")]
        media_type: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        filename: Option<String>,
    },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn image_url(url: impl Into<String>) -> Self {
        Self::Image {
            source: MediaSource::Url { url: url.into() },
            media_type: None,
        }
    }

    pub fn image_base64(data: impl Into<String>, media_type: impl Into<String>) -> Self {
        Self::Image {
            source: MediaSource::Base64 { data: data.into() },
            media_type: Some(media_type.into()),
        }
    }

    pub fn audio_url(url: impl Into<String>) -> Self {
        Self::Audio {
            source: MediaSource::Url { url: url.into() },
            media_type: None,
        }
    }

    pub fn file_url(url: impl Into<String>, filename: Option<String>) -> Self {
        Self::File {
            source: MediaSource::Url { url: url.into() },
            media_type: None,
            filename,
        }
    }

    /// Anything other than text needs a vision-capable model.
    pub const fn is_binary(&self) -> bool {
        !matches!(self, Self::Text { .. })
    }
}

/// Plain text or an ordered list of typed parts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    MultiModal(Vec<ContentPart>),
}

impl MessageContent {
    /// First text fragment, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::MultiModal(parts) => parts.iter().find_map(|part| match part {
                ContentPart::Text { text } => Some(text.as_str()),
                _ => None,
            }),
        }
    }

    /// All text fragments joined with newlines.
    pub fn all_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::MultiModal(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    pub fn has_binary(&self) -> bool {
        match self {
            Self::Text(_) => false,
            Self::MultiModal(parts) => parts.iter().any(ContentPart::is_binary),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.is_empty(),
            Self::MultiModal(parts) => parts.is_empty(),
        }
    }
}

impl From<&str> for MessageContent {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for MessageContent {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<ContentPart>> for MessageContent {
    fn from(value: Vec<ContentPart>) -> Self {
        Self::MultiModal(value)
    }
}

/// One turn of conversation.
///
/// A `Tool` message always carries the `tool_call_id` of a call emitted by a
/// preceding assistant message.
///
/// # Examples
///
/// ```rust,ignore
/// use confab::types::ChatMessage;
///
/// let msg = ChatMessage::user("Hello!").build();
/// let result = ChatMessage::tool_result("call_1", "{\"temperature\":22}").build();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: MessageContent,
    /// Calls requested by an assistant message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Links a tool result to its originating call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Tool result produced by a failure rather than a successful invocation.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
    /// Reasoning text attached to an assistant message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl ChatMessage {
    pub fn user(content: impl Into<MessageContent>) -> ChatMessageBuilder {
        ChatMessageBuilder::new(MessageRole::User, content.into())
    }

    pub fn system(content: impl Into<String>) -> ChatMessageBuilder {
        ChatMessageBuilder::new(MessageRole::System, MessageContent::Text(content.into()))
    }

    pub fn developer(content: impl Into<String>) -> ChatMessageBuilder {
        ChatMessageBuilder::new(MessageRole::Developer, MessageContent::Text(content.into()))
    }

    pub fn assistant(content: impl Into<String>) -> ChatMessageBuilder {
        ChatMessageBuilder::new(MessageRole::Assistant, MessageContent::Text(content.into()))
    }

    /// Tool result message linked to `tool_call_id`.
    pub fn tool_result(
        tool_call_id: impl Into<String>,
        content: impl Into<String>,
    ) -> ChatMessageBuilder {
        let mut builder =
            ChatMessageBuilder::new(MessageRole::Tool, MessageContent::Text(content.into()));
        builder.tool_call_id = Some(tool_call_id.into());
        builder
    }

    /// Gets the text content of the message
    pub fn content_text(&self) -> Option<&str> {
        self.content.text()
    }

    /// Check if message contains tool calls
    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls.as_ref().is_some_and(|calls| !calls.is_empty())
    }
}

/// Builder for [`ChatMessage`].
#[derive(Debug, Clone)]
pub struct ChatMessageBuilder {
    role: MessageRole,
    content: MessageContent,
    tool_calls: Option<Vec<ToolCall>>,
    tool_call_id: Option<String>,
    is_error: bool,
    reasoning: Option<String>,
}

impl ChatMessageBuilder {
    fn new(role: MessageRole, content: MessageContent) -> Self {
        Self {
            role,
            content,
            tool_calls: None,
            tool_call_id: None,
            is_error: false,
            reasoning: None,
        }
    }

    /// Attach tool calls (assistant messages). Empty lists are dropped.
    pub fn with_tool_calls(mut self, calls: Vec<ToolCall>) -> Self {
        self.tool_calls = if calls.is_empty() { None } else { Some(calls) };
        self
    }

    pub fn with_error(mut self, is_error: bool) -> Self {
        self.is_error = is_error;
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        let reasoning = reasoning.into();
        self.reasoning = if reasoning.is_empty() {
            None
        } else {
            Some(reasoning)
        };
        self
    }

    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        let part = ContentPart::image_url(url);
        self.content = match self.content {
            MessageContent::Text(text) if text.is_empty() => MessageContent::MultiModal(vec![part]),
            MessageContent::Text(text) => {
                MessageContent::MultiModal(vec![ContentPart::Text { text }, part])
            }
            MessageContent::MultiModal(mut parts) => {
                parts.push(part);
                MessageContent::MultiModal(parts)
            }
        };
        self
    }

    pub fn build(self) -> ChatMessage {
        ChatMessage {
            role: self.role,
            content: self.content,
            tool_calls: self.tool_calls,
            tool_call_id: self.tool_call_id,
            is_error: self.is_error,
            reasoning: self.reasoning,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ToolCall;

    #[test]
    fn image_part_marks_content_as_binary() {
        let msg = ChatMessage::user("What is this?")
            .with_image_url("https://example.com/cat.png")
            .build();
        assert!(msg.content.has_binary());
        assert_eq!(msg.content_text(), Some("What is this?"));
    }

    #[test]
    fn empty_tool_call_list_is_not_kept() {
        let msg = ChatMessage::assistant("done")
            .with_tool_calls(vec![])
            .build();
        assert!(msg.tool_calls.is_none());
        assert!(!msg.has_tool_calls());

        let msg = ChatMessage::assistant("")
            .with_tool_calls(vec![ToolCall::function("1", "get_weather", "{}")])
            .build();
        assert!(msg.has_tool_calls());
    }

    #[test]
    fn tool_result_serializes_error_flag_only_when_set() {
        let ok = ChatMessage::tool_result("1", "fine").build();
        let json = serde_json::to_value(&ok).unwrap();
        assert!(json.get("is_error").is_none());
        assert_eq!(json["tool_call_id"], "1");

        let failed = ChatMessage::tool_result("1", "boom")
            .with_error(true)
            .build();
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["is_error"], true);
    }
}
