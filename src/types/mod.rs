//! Core data model shared by providers, tools, middleware and sessions.

mod message;
mod request;
mod response;
mod tools;
mod usage;

pub use message::{
    ChatMessage, ChatMessageBuilder, ContentPart, MediaSource, MessageContent, MessageRole,
};
pub use request::{ChatRequest, CommonParams, OutputSchema, ResponseFormat, ThinkingConfig};
pub use response::{ChatChunk, ChatResponse, FinishReason};
pub use tools::{FunctionCall, Tool, ToolCall, ToolFunction};
pub use usage::{Pricing, Usage};

pub(crate) use tools::empty_object_schema;
