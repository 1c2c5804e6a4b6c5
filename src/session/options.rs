//! Per-call options

use std::collections::HashMap;
use std::time::Duration;

use validator::Validate;

use crate::error::LlmError;
use crate::tools::ToolExecutionMode;
use crate::types::ThinkingConfig;

/// Overrides for a single `ask`/`stream` call. Unset fields fall back to the
/// session defaults.
#[derive(Debug, Clone, Default, Validate)]
pub struct AskOptions {
    #[validate(range(min = 0.0, max = 2.0))]
    pub temperature: Option<f32>,
    #[validate(range(min = 1))]
    pub max_tokens: Option<u32>,
    pub request_timeout: Option<Duration>,
    pub tool_execution: Option<ToolExecutionMode>,
    /// Tool-call round trips allowed for this call.
    pub max_tool_calls: Option<usize>,
    pub headers: HashMap<String, String>,
    pub thinking: Option<ThinkingConfig>,
    /// Skip capability checks (a warning is logged instead).
    pub assume_model_exists: Option<bool>,
}

impl AskOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn with_tool_execution(mut self, mode: ToolExecutionMode) -> Self {
        self.tool_execution = Some(mode);
        self
    }

    pub fn with_max_tool_calls(mut self, max_tool_calls: usize) -> Self {
        self.max_tool_calls = Some(max_tool_calls);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_thinking(mut self, thinking: ThinkingConfig) -> Self {
        self.thinking = Some(thinking);
        self
    }

    pub fn with_assume_model_exists(mut self, assume: bool) -> Self {
        self.assume_model_exists = Some(assume);
        self
    }

    pub(crate) fn validate_params(&self) -> Result<(), LlmError> {
        self.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_sane_values() {
        let options = AskOptions::new().with_temperature(0.7).with_max_tokens(256);
        assert!(options.validate_params().is_ok());
        assert!(AskOptions::default().validate_params().is_ok());
    }

    #[test]
    fn rejects_out_of_range_values() {
        let err = AskOptions::new()
            .with_temperature(3.5)
            .validate_params()
            .unwrap_err();
        assert!(matches!(err, LlmError::InvalidParameter(msg) if msg.contains("temperature")));

        assert!(
            AskOptions::new()
                .with_max_tokens(0)
                .validate_params()
                .is_err()
        );
    }
}
