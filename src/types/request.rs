//! Chat request types

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::message::ChatMessage;
use super::tools::Tool;

/// Parameters every provider understands.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommonParams {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// Extended reasoning request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThinkingConfig {
    /// Token budget the model may spend on reasoning.
    pub budget_tokens: u32,
}

impl ThinkingConfig {
    pub const fn with_budget(budget_tokens: u32) -> Self {
        Self { budget_tokens }
    }
}

/// Named JSON schema for structured output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSchema {
    pub name: String,
    pub schema: serde_json::Value,
    #[serde(default)]
    pub strict: bool,
}

impl OutputSchema {
    pub fn new(name: impl Into<String>, schema: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            schema,
            strict: true,
        }
    }

    /// Derive the schema from a Rust type.
    pub fn for_type<T: schemars::JsonSchema>(name: impl Into<String>) -> Self {
        let root = schemars::schema_for!(T);
        Self::new(
            name,
            serde_json::to_value(root).unwrap_or_else(|_| super::tools::empty_object_schema()),
        )
    }
}

/// Requested response format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseFormat {
    Text,
    JsonObject,
    JsonSchema(OutputSchema),
}

/// Provider-agnostic request handed to [`crate::traits::ChatProvider`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub common_params: CommonParams,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<ThinkingConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
    /// Provider-specific extras merged into the wire payload.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub params: serde_json::Map<String, serde_json::Value>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            common_params: CommonParams {
                model: model.into(),
                ..Default::default()
            },
            messages,
            ..Default::default()
        }
    }

    pub fn model(&self) -> &str {
        &self.common_params.model
    }
}
