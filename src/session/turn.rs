//! Non-streaming turn loop and the pieces shared with streaming.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;
use tracing::Instrument;

use super::{AskOptions, ChatSession};
use crate::config;
use crate::error::LlmError;
use crate::middleware::{MiddlewareContext, MiddlewarePipeline};
use crate::retry::{maybe_retry, with_timeout};
use crate::tools::{ToolExecutionMode, ToolExecutor};
use crate::types::{
    ChatMessage, ChatRequest, ChatResponse, MessageContent, OutputSchema, ResponseFormat,
    ThinkingConfig, Usage,
};
use crate::validation::{RequiredFeatures, validate_capabilities};

/// Effective settings for one `ask`/`stream` call.
#[derive(Debug, Clone)]
pub(super) struct TurnSettings {
    pub request_id: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub timeout: Option<Duration>,
    pub mode: ToolExecutionMode,
    pub max_tool_calls: usize,
    pub thinking: Option<ThinkingConfig>,
    pub headers: HashMap<String, String>,
    pub assume_model_exists: bool,
}

/// Mutable state of one call across its rounds.
#[derive(Debug)]
pub(super) struct TurnState {
    /// Messages of the current round, not yet in history.
    pub pending: Vec<ChatMessage>,
    pub rounds: usize,
    pub usage: Option<Usage>,
}

impl TurnState {
    pub fn new(user: ChatMessage) -> Self {
        Self {
            pending: vec![user],
            rounds: 0,
            usage: None,
        }
    }
}

impl ChatSession {
    /// Send `content` as a user message and run the tool loop to a final answer.
    ///
    /// # Errors
    ///
    /// - `CapabilityError` when the model lacks a feature the request needs
    ///   (unless `assume_model_exists` is set);
    /// - `LoopGuardError` after more than `max_tool_calls` tool round trips;
    /// - provider, timeout and middleware errors as they occur.
    ///
    /// Tool failures are not errors unless a middleware answers `Stop`.
    pub async fn ask(
        &mut self,
        content: impl Into<MessageContent>,
        options: AskOptions,
    ) -> Result<ChatResponse, LlmError> {
        let settings = self.settings(&options)?;
        let span = tracing::info_span!(
            "ask",
            provider = %self.provider.id(),
            model = %self.model,
            request_id = %settings.request_id
        );
        let user = ChatMessage::user(content).build();
        self.run_turn(user, settings).instrument(span).await
    }

    async fn run_turn(
        &mut self,
        user: ChatMessage,
        settings: TurnSettings,
    ) -> Result<ChatResponse, LlmError> {
        let pipeline = self.pipeline();
        let mut state = TurnState::new(user);

        loop {
            let (ctx, request) = self.prepare_round(&settings, &pipeline, &state, false).await?;
            let response = self.call_provider(&settings, request).await?;
            self.events.new_message();
            if let Some(done) = self
                .finish_round(&settings, &pipeline, &ctx, response, &mut state)
                .await?
            {
                return Ok(done);
            }
        }
    }

    pub(super) fn settings(&self, options: &AskOptions) -> Result<TurnSettings, LlmError> {
        let merged = AskOptions {
            temperature: options.temperature.or(self.temperature),
            max_tokens: options.max_tokens.or(self.max_tokens),
            request_timeout: options.request_timeout.or(self.request_timeout),
            tool_execution: Some(options.tool_execution.unwrap_or(self.tool_execution)),
            max_tool_calls: Some(options.max_tool_calls.unwrap_or(self.max_tool_calls)),
            headers: options.headers.clone(),
            thinking: options.thinking.or(self.thinking),
            assume_model_exists: Some(
                options.assume_model_exists.unwrap_or(self.assume_model_exists),
            ),
        };
        merged.validate_params()?;

        Ok(TurnSettings {
            request_id: uuid::Uuid::new_v4().to_string(),
            temperature: merged.temperature,
            max_tokens: merged.max_tokens,
            timeout: merged.request_timeout,
            mode: merged.tool_execution.unwrap_or_default(),
            max_tool_calls: merged.max_tool_calls.unwrap_or(self.max_tool_calls),
            thinking: merged.thinking,
            headers: merged.headers,
            assume_model_exists: merged.assume_model_exists.unwrap_or_default(),
        })
    }

    /// Global middleware first, then the session's.
    pub(super) fn pipeline(&self) -> MiddlewarePipeline {
        MiddlewarePipeline::new(&config::global_middlewares(), &self.middlewares)
    }

    /// History plus `pending`, with instructions and system/developer
    /// messages moved to the front.
    pub(super) fn outgoing_messages(&self, pending: &[ChatMessage]) -> Vec<ChatMessage> {
        let mut front = Vec::new();
        let mut rest = Vec::with_capacity(self.history.len() + pending.len());
        if let Some(instructions) = &self.instructions {
            front.push(ChatMessage::system(instructions.clone()).build());
        }
        for message in self.history.iter().chain(pending) {
            if message.role.is_instruction() {
                front.push(message.clone());
            } else {
                rest.push(message.clone());
            }
        }
        front.extend(rest);
        front
    }

    /// Build, validate and run `on_request` for the next provider call.
    pub(super) async fn prepare_round(
        &self,
        settings: &TurnSettings,
        pipeline: &MiddlewarePipeline,
        state: &TurnState,
        streaming: bool,
    ) -> Result<(MiddlewareContext, ChatRequest), LlmError> {
        let mut request =
            ChatRequest::new(self.model.clone(), self.outgoing_messages(&state.pending));
        request.common_params.temperature = settings.temperature;
        request.common_params.max_tokens = settings.max_tokens;
        request.tools = self.tools.to_tools();
        request.thinking = settings.thinking;
        request.response_format = self.schema.clone().map(ResponseFormat::JsonSchema);
        request.headers = settings.headers.clone();
        request.params = self.params.clone();

        validate_capabilities(
            self.provider.id(),
            &self.model,
            self.provider.capabilities(),
            &RequiredFeatures::of(&request),
            settings.assume_model_exists,
        )?;

        let mut ctx = MiddlewareContext::new(
            settings.request_id.clone(),
            self.provider.id(),
            self.model.clone(),
            std::mem::take(&mut request.messages),
        );
        ctx.round = state.rounds;
        ctx.streaming = streaming;
        ctx.temperature = settings.temperature;
        ctx.max_tokens = settings.max_tokens;
        pipeline.apply_request_chain(&mut ctx).await?;
        request.messages = ctx.messages.clone();

        tracing::debug!(
            round = state.rounds,
            messages = request.messages.len(),
            tools = self.tools.len(),
            streaming,
            "sending request"
        );
        Ok((ctx, request))
    }

    /// `chat` under the configured timeout and retry policy.
    pub(super) async fn call_provider(
        &self,
        settings: &TurnSettings,
        request: ChatRequest,
    ) -> Result<ChatResponse, LlmError> {
        let provider = self.provider.as_ref();
        let timeout = settings.timeout;
        maybe_retry(self.retry.as_ref(), || {
            with_timeout(timeout, provider.chat(request.clone()))
        })
        .await
    }

    /// Everything after a response is in hand: pricing, `on_response`, usage, the
    /// tool round, history commit. Returns the final response once the model
    /// stops calling tools.
    pub(super) async fn finish_round(
        &mut self,
        settings: &TurnSettings,
        pipeline: &MiddlewarePipeline,
        ctx: &MiddlewareContext,
        mut response: ChatResponse,
        state: &mut TurnState,
    ) -> Result<Option<ChatResponse>, LlmError> {
        self.price(&mut response);
        let response = pipeline.apply_response_chain(ctx, response).await?;
        if let Some(usage) = &response.usage {
            self.total_usage += usage;
            *state.usage.get_or_insert_with(Usage::default) += usage;
        }
        self.events.end_message(&response);

        if !response.has_tool_calls() {
            state.pending.push(response.to_assistant_message());
            self.history.append(&mut state.pending);
            return Ok(Some(self.complete(response, state)));
        }

        if settings.mode == ToolExecutionMode::DryRun {
            tracing::debug!(
                calls = response.tool_calls().len(),
                "dry run, returning proposed tool calls"
            );
            state.pending.push(response.to_assistant_message());
            self.history.append(&mut state.pending);
            return Ok(Some(self.complete(response, state)));
        }

        let results = ToolExecutor {
            registry: &self.tools,
            pipeline,
            ctx,
            events: &self.events,
            provider: self.provider.as_ref(),
            mode: settings.mode,
            max_retries: self.max_tool_retries,
            validate_arguments: self.validate_tool_arguments,
            parallel: self.parallel_tool_calls,
        }
        .execute_all(response.tool_calls())
        .await?;

        state.pending.push(response.to_assistant_message());
        state.pending.extend(results);
        self.history.append(&mut state.pending);
        state.rounds += 1;

        if state.rounds > settings.max_tool_calls {
            tracing::warn!(
                rounds = state.rounds,
                limit = settings.max_tool_calls,
                "tool-call round trip limit exceeded"
            );
            return Err(LlmError::LoopGuardError {
                provider: self.provider.id().to_string(),
                model: self.model.clone(),
                limit: settings.max_tool_calls,
            });
        }
        Ok(None)
    }

    /// Fill in cost from static pricing when the provider reported none.
    fn price(&self, response: &mut ChatResponse) {
        let Some(usage) = response.usage.as_mut() else {
            return;
        };
        if usage.cost.is_none() {
            if let Some(pricing) = self.provider.capabilities().pricing(&self.model) {
                usage.cost = Some(pricing.cost_of(usage));
            }
        }
    }

    fn complete(&mut self, mut response: ChatResponse, state: &TurnState) -> ChatResponse {
        response.usage = state.usage.clone();
        if response.model.is_none() {
            response.model = Some(self.model.clone());
        }
        response.created.get_or_insert_with(chrono::Utc::now);
        if let Some(schema) = &self.schema {
            if !response.has_tool_calls() {
                response.parsed = parse_structured(&response.content, schema);
            }
        }
        tracing::debug!(rounds = state.rounds, "turn complete");
        self.last_response = Some(response.clone());
        response
    }
}

/// Parse and validate structured output. Failures are logged, not raised.
fn parse_structured(content: &str, schema: &OutputSchema) -> Option<Value> {
    let text = extract_json_block(content).unwrap_or(content).trim();
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(schema = %schema.name, "structured output is not valid JSON: {}", e);
            return None;
        }
    };
    match jsonschema::validator_for(&schema.schema) {
        Ok(validator) => {
            let errors: Vec<String> = validator
                .iter_errors(&value)
                .map(|e| e.to_string())
                .collect();
            if errors.is_empty() {
                Some(value)
            } else {
                tracing::warn!(
                    schema = %schema.name,
                    "structured output does not match schema: {}",
                    errors.join("; ")
                );
                None
            }
        }
        Err(e) => {
            tracing::warn!(schema = %schema.name, "output schema does not compile: {}", e);
            Some(value)
        }
    }
}

/// Contents of a ```json fenced block, if any.
fn extract_json_block(text: &str) -> Option<&str> {
    let start = text
        .find("```json\n")
        .map(|i| i + 8)
        .or_else(|| text.find("```\n").map(|i| i + 4))?;
    let remaining = &text[start..];
    let end = remaining.find("\n```")?;
    Some(&remaining[..end])
}
