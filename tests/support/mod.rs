//! Scripted provider and tool fixtures shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use confab::prelude::*;
use confab::streaming::from_chunks;
use serde_json::json;

pub const MODEL: &str = "mock-model";

/// Replays canned responses in order and records every request.
#[derive(Debug)]
pub struct ScriptedProvider {
    script: Mutex<VecDeque<ChatResponse>>,
    failures: Mutex<VecDeque<LlmError>>,
    delay: Option<Duration>,
    repeat: Option<ChatResponse>,
    requests: Mutex<Vec<ChatRequest>>,
    calls: AtomicUsize,
    streaming: bool,
    capabilities: StaticCapabilities,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<ChatResponse>) -> Self {
        Self {
            script: Mutex::new(responses.into()),
            failures: Mutex::new(VecDeque::new()),
            delay: None,
            repeat: None,
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            streaming: false,
            capabilities: StaticCapabilities::new().with_fallback(ModelInfo::all()),
        }
    }

    /// Answers every request with `response`.
    pub fn always(response: ChatResponse) -> Self {
        let mut provider = Self::new(Vec::new());
        provider.repeat = Some(response);
        provider
    }

    pub fn streaming(mut self) -> Self {
        self.streaming = true;
        self
    }

    /// The first calls fail with `errors`, in order, before the script is used.
    pub fn failing_first(self, errors: Vec<LlmError>) -> Self {
        *self.failures.lock().unwrap() = errors.into();
        self
    }

    /// `chat` answers only after `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_capabilities(mut self, capabilities: StaticCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next(&self, request: ChatRequest) -> Result<ChatResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);
        if let Some(error) = self.failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        if let Some(response) = self.script.lock().unwrap().pop_front() {
            return Ok(response);
        }
        self.repeat
            .clone()
            .ok_or_else(|| LlmError::InternalError("script exhausted".into()))
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    fn id(&self) -> &str {
        "scripted"
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LlmError> {
        let response = self.next(request);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        response
    }

    async fn stream(&self, request: ChatRequest) -> Result<ChatStream, LlmError> {
        let response = self.next(request)?;
        Ok(from_chunks(split_into_chunks(response)))
    }

    fn supports_streaming(&self) -> bool {
        self.streaming
    }

    fn capabilities(&self) -> &dyn ModelCapabilities {
        &self.capabilities
    }
}

/// Content split per word, then reasoning, tool calls and usage as separate chunks.
pub fn split_into_chunks(response: ChatResponse) -> Vec<ChatChunk> {
    let mut chunks: Vec<ChatChunk> = response
        .content
        .split_inclusive(' ')
        .map(ChatChunk::content)
        .collect();
    if let Some(thinking) = response.thinking {
        chunks.push(ChatChunk::reasoning(thinking));
    }
    if let Some(calls) = response.tool_calls {
        chunks.push(ChatChunk::tool_calls(calls));
    }
    if let Some(usage) = response.usage {
        chunks.push(ChatChunk::usage(usage));
    }
    chunks
}

pub fn weather_call(id: &str) -> ChatResponse {
    ChatResponse {
        usage: Some(Usage::new(10, 5)),
        ..ChatResponse::with_tool_calls(vec![ToolCall::function(
            id,
            "get_weather",
            r#"{"location":"Paris"}"#,
        )])
    }
}

pub fn answer(text: &str) -> ChatResponse {
    ChatResponse {
        usage: Some(Usage::new(20, 7)),
        ..ChatResponse::new(text)
    }
}

pub fn weather_tool() -> ToolDefinition {
    ToolDefinition::new(
        "get_weather",
        "Current weather for a city",
        json!({
            "type": "object",
            "properties": {"location": {"type": "string"}},
            "required": ["location"]
        }),
        |_args| async move { Ok(json!({"temperature": 22})) },
    )
}

pub fn failing_tool(name: &str) -> ToolDefinition {
    ToolDefinition::new(name, "Always fails", json!({"type": "object"}), |_args| async move {
        Err(LlmError::InternalError("backend unavailable".into()))
    })
}
