//! Capability validation
//!
//! Rejects requests the bound model cannot serve before anything is sent.
//! Only static capability metadata is consulted.

use crate::error::LlmError;
use crate::traits::ModelCapabilities;
use crate::types::{ChatRequest, ResponseFormat};

/// Features a request needs from the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequiredFeatures {
    pub vision: bool,
    pub tools: bool,
    pub structured_output: bool,
    pub reasoning: bool,
    pub max_tokens: Option<u32>,
}

impl RequiredFeatures {
    pub fn of(request: &ChatRequest) -> Self {
        Self {
            vision: request.messages.iter().any(|m| m.content.has_binary()),
            tools: request.tools.as_ref().is_some_and(|tools| !tools.is_empty()),
            structured_output: matches!(
                request.response_format,
                Some(ResponseFormat::JsonSchema(_) | ResponseFormat::JsonObject)
            ),
            reasoning: request.thinking.is_some(),
            max_tokens: request.common_params.max_tokens,
        }
    }
}

/// Check `features` against the model's capabilities.
///
/// With `assume_model_exists` set, every failed check is logged as a warning
/// and the request goes ahead.
pub fn validate_capabilities(
    provider: &str,
    model: &str,
    capabilities: &dyn ModelCapabilities,
    features: &RequiredFeatures,
    assume_model_exists: bool,
) -> Result<(), LlmError> {
    let checks = [
        (features.vision, "vision", capabilities.supports_vision(model)),
        (features.tools, "tools", capabilities.supports_tools(model)),
        (
            features.structured_output,
            "structured output",
            capabilities.supports_structured_output(model),
        ),
        (
            features.reasoning,
            "reasoning",
            capabilities.supports_reasoning(model),
        ),
    ];

    for (required, feature, supported) in checks {
        if !required || supported {
            continue;
        }
        if assume_model_exists {
            tracing::warn!(
                provider,
                model,
                feature,
                "capability check overridden: model may not support {}",
                feature
            );
        } else {
            return Err(LlmError::capability(provider, model, feature));
        }
    }

    if let (Some(requested), Some(window)) =
        (features.max_tokens, capabilities.context_window(model))
    {
        if requested > window {
            if assume_model_exists {
                tracing::warn!(
                    provider,
                    model,
                    requested,
                    window,
                    "capability check overridden: max_tokens exceeds context window"
                );
            } else {
                return Err(LlmError::InvalidParameter(format!(
                    "max_tokens {requested} exceeds the {window}-token context window of '{model}'"
                )));
            }
        }
    }

    Ok(())
}
