//! Chat sessions
//!
//! A [`ChatSession`] is bound to one provider and one model. It owns the
//! conversation history and cumulative usage, and drives each `ask`/`stream`
//! call through the tool loop:
//!
//! 1. send history (instructions first) to the provider;
//! 2. no tool calls: the turn is done;
//! 3. tool calls: execute them, append the assistant message and one result
//!    per call, count the round, and go back to 1 unless the round limit is
//!    exceeded (`LoopGuardError`).
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use confab::prelude::*;
//!
//! let mut session = ChatSession::new(provider, "gpt-4o")
//!     .with_instructions("You are terse.")
//!     .with_tool(weather_tool);
//! let reply = session.ask("Weather in Paris?", AskOptions::default()).await?;
//! println!("{}", reply.content);
//! ```
//!
//! A session runs one call at a time; use separate sessions for parallel
//! conversations.

mod events;
mod options;
mod stream;
mod turn;

use std::sync::Arc;
use std::time::Duration;

pub use events::SessionEvents;
pub use options::AskOptions;

use crate::config;
use crate::error::LlmError;
use crate::middleware::Middleware;
use crate::retry::RetryOptions;
use crate::tools::{ToolDefinition, ToolExecutionMode, ToolRegistry, TypedTool};
use crate::traits::ChatProvider;
use crate::types::{ChatMessage, ChatResponse, OutputSchema, ThinkingConfig, ToolCall, Usage};

pub struct ChatSession {
    provider: Arc<dyn ChatProvider>,
    model: String,
    instructions: Option<String>,
    history: Vec<ChatMessage>,
    total_usage: Usage,
    last_response: Option<ChatResponse>,
    tools: ToolRegistry,
    middlewares: Vec<Arc<dyn Middleware>>,
    events: SessionEvents,
    schema: Option<OutputSchema>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    params: serde_json::Map<String, serde_json::Value>,
    thinking: Option<ThinkingConfig>,
    tool_execution: ToolExecutionMode,
    max_tool_calls: usize,
    max_tool_retries: u32,
    parallel_tool_calls: bool,
    validate_tool_arguments: bool,
    request_timeout: Option<Duration>,
    retry: Option<RetryOptions>,
    assume_model_exists: bool,
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("provider", &self.provider.id())
            .field("model", &self.model)
            .field("history", &self.history.len())
            .field("tools", &self.tools.names())
            .field("total_usage", &self.total_usage)
            .finish_non_exhaustive()
    }
}

impl ChatSession {
    /// New session with defaults taken from the global [`config`].
    pub fn new(provider: Arc<dyn ChatProvider>, model: impl Into<String>) -> Self {
        let cfg = config::snapshot();
        Self {
            provider,
            model: model.into(),
            instructions: None,
            history: Vec::new(),
            total_usage: Usage::default(),
            last_response: None,
            tools: ToolRegistry::new(),
            middlewares: Vec::new(),
            events: SessionEvents::default(),
            schema: None,
            temperature: None,
            max_tokens: None,
            params: serde_json::Map::new(),
            thinking: None,
            tool_execution: cfg.tool_execution,
            max_tool_calls: cfg.max_tool_calls,
            max_tool_retries: cfg.max_tool_retries,
            parallel_tool_calls: cfg.parallel_tool_calls,
            validate_tool_arguments: cfg.validate_tool_arguments,
            request_timeout: cfg.request_timeout,
            retry: cfg.retry,
            assume_model_exists: false,
        }
    }

    pub fn with_tool(mut self, tool: ToolDefinition) -> Self {
        self.tools.register(tool);
        self
    }

    pub fn with_typed_tool<T: TypedTool>(self, tool: T) -> Self {
        self.with_tool(ToolDefinition::from_typed(tool))
    }

    pub fn with_tools(mut self, tools: impl IntoIterator<Item = ToolDefinition>) -> Self {
        for tool in tools {
            self.tools.register(tool);
        }
        self
    }

    /// Request structured output; the final response is parsed into `parsed`.
    pub fn with_schema(mut self, schema: OutputSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// System instructions, always sent first.
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Provider-specific request parameters, merged into existing ones.
    pub fn with_params(mut self, params: serde_json::Map<String, serde_json::Value>) -> Self {
        self.params.extend(params);
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    pub fn with_tool_execution(mut self, mode: ToolExecutionMode) -> Self {
        self.tool_execution = mode;
        self
    }

    /// Session middleware; runs after global middleware, in registration order.
    pub fn with_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middlewares.push(middleware);
        self
    }

    pub fn with_max_tool_calls(mut self, max_tool_calls: usize) -> Self {
        self.max_tool_calls = max_tool_calls;
        self
    }

    pub fn with_max_tool_retries(mut self, max_tool_retries: u32) -> Self {
        self.max_tool_retries = max_tool_retries;
        self
    }

    pub fn with_parallel_tool_calls(mut self, parallel: bool) -> Self {
        self.parallel_tool_calls = parallel;
        self
    }

    pub fn with_validate_tool_arguments(mut self, validate: bool) -> Self {
        self.validate_tool_arguments = validate;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn with_retry(mut self, retry: RetryOptions) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Send every provider request exactly once.
    pub fn without_retry(mut self) -> Self {
        self.retry = None;
        self
    }

    /// Trust the model id: capability checks only log warnings.
    pub fn with_assume_model_exists(mut self, assume: bool) -> Self {
        self.assume_model_exists = assume;
        self
    }

    pub fn with_thinking(mut self, thinking: ThinkingConfig) -> Self {
        self.thinking = Some(thinking);
        self
    }

    pub fn on_new_message<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.events.on_new_message = Some(Arc::new(f));
        self
    }

    pub fn on_end_message<F>(mut self, f: F) -> Self
    where
        F: Fn(&ChatResponse) + Send + Sync + 'static,
    {
        self.events.on_end_message = Some(Arc::new(f));
        self
    }

    pub fn on_tool_call_start<F>(mut self, f: F) -> Self
    where
        F: Fn(&ToolCall) + Send + Sync + 'static,
    {
        self.events.on_tool_call_start = Some(Arc::new(f));
        self
    }

    pub fn on_tool_call_end<F>(mut self, f: F) -> Self
    where
        F: Fn(&ToolCall, &str) + Send + Sync + 'static,
    {
        self.events.on_tool_call_end = Some(Arc::new(f));
        self
    }

    pub fn on_tool_call_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&ToolCall, &LlmError) + Send + Sync + 'static,
    {
        self.events.on_tool_call_error = Some(Arc::new(f));
        self
    }

    /// Approval gate used in [`ToolExecutionMode::Confirm`].
    pub fn on_confirm_tool_call<F>(mut self, f: F) -> Self
    where
        F: Fn(&ToolCall) -> bool + Send + Sync + 'static,
    {
        self.events.on_confirm_tool_call = Some(Arc::new(f));
        self
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Usage summed over every provider response this session received.
    pub fn total_usage(&self) -> &Usage {
        &self.total_usage
    }

    pub fn last_response(&self) -> Option<&ChatResponse> {
        self.last_response.as_ref()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider_id(&self) -> &str {
        self.provider.id()
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn instructions(&self) -> Option<&str> {
        self.instructions.as_deref()
    }
}
