//! Turn loop behavior of `ChatSession::ask` against a scripted provider.

mod support;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use confab::prelude::*;
use confab::retry::{RetryOptions, RetryPolicy};
use serde_json::json;
use support::{MODEL, ScriptedProvider, answer, weather_call, weather_tool};
use tracing_test::traced_test;

fn session(provider: &Arc<ScriptedProvider>) -> ChatSession {
    ChatSession::new(provider.clone(), MODEL).without_retry()
}

#[tokio::test]
async fn weather_in_paris() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        weather_call("1"),
        answer("It is sunny in Paris."),
    ]));
    let mut session = session(&provider).with_tool(weather_tool());

    let reply = session
        .ask("Weather in Paris?", AskOptions::default())
        .await
        .unwrap();

    assert_eq!(reply.content, "It is sunny in Paris.");
    let history = session.history();
    assert_eq!(history.len(), 4);
    assert_eq!(history[0].role, MessageRole::User);
    assert_eq!(history[1].role, MessageRole::Assistant);
    assert_eq!(history[1].tool_calls.as_ref().map(Vec::len), Some(1));
    assert_eq!(history[2].role, MessageRole::Tool);
    assert_eq!(history[2].tool_call_id.as_deref(), Some("1"));
    assert_eq!(history[2].content_text(), Some(r#"{"temperature":22}"#));
    assert!(!history[2].is_error);
    assert_eq!(history[3].role, MessageRole::Assistant);
    assert!(!history[3].has_tool_calls());

    // Second request carries the whole causal chain.
    let requests = provider.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].messages.len(), 3);
    assert!(requests[0].tools.as_ref().is_some_and(|t| t[0].function.name == "get_weather"));
}

#[tokio::test]
async fn history_follows_call_emission_order() {
    let two_calls = ChatResponse::with_tool_calls(vec![
        ToolCall::function("a", "get_weather", r#"{"location":"Paris"}"#),
        ToolCall::function("b", "get_weather", r#"{"location":"Oslo"}"#),
    ]);
    let provider = Arc::new(ScriptedProvider::new(vec![
        two_calls,
        weather_call("c"),
        answer("done"),
    ]));
    let mut session = session(&provider).with_tool(weather_tool());

    session.ask("compare", AskOptions::default()).await.unwrap();

    let shape: Vec<(MessageRole, Option<&str>)> = session
        .history()
        .iter()
        .map(|m| (m.role, m.tool_call_id.as_deref()))
        .collect();
    assert_eq!(
        shape,
        vec![
            (MessageRole::User, None),
            (MessageRole::Assistant, None),
            (MessageRole::Tool, Some("a")),
            (MessageRole::Tool, Some("b")),
            (MessageRole::Assistant, None),
            (MessageRole::Tool, Some("c")),
            (MessageRole::Assistant, None),
        ]
    );
    assert_eq!(
        session.history().iter().filter(|m| m.role == MessageRole::User).count(),
        1
    );
}

#[tokio::test]
async fn loop_guard_allows_k_plus_one_calls() {
    for k in [0usize, 1, 3] {
        let provider = Arc::new(ScriptedProvider::always(weather_call("1")));
        let mut session = session(&provider)
            .with_tool(weather_tool())
            .with_max_tool_calls(k);

        let err = session
            .ask("loop forever", AskOptions::default())
            .await
            .unwrap_err();

        assert!(
            matches!(err, LlmError::LoopGuardError { limit, ref model, .. } if limit == k && model == MODEL)
        );
        assert!(err.is_fatal() && !err.is_retryable());
        assert_eq!(provider.calls(), k + 1, "max_tool_calls = {k}");
    }
}

#[tokio::test]
async fn per_call_options_override_session_defaults() {
    let provider = Arc::new(ScriptedProvider::always(weather_call("1")));
    let mut session = session(&provider)
        .with_tool(weather_tool())
        .with_temperature(0.2);

    let options = AskOptions::new()
        .with_max_tool_calls(2)
        .with_temperature(0.9);
    assert!(session.ask("go", options).await.is_err());
    assert_eq!(provider.calls(), 3);
    assert_eq!(provider.requests()[0].common_params.temperature, Some(0.9));
}

#[tokio::test]
async fn invalid_options_fail_before_sending() {
    let provider = Arc::new(ScriptedProvider::new(vec![answer("hi")]));
    let mut session = session(&provider);

    let err = session
        .ask("hello", AskOptions::new().with_temperature(7.0))
        .await
        .unwrap_err();

    assert!(matches!(err, LlmError::InvalidParameter(_)));
    assert_eq!(provider.calls(), 0);
    assert!(session.history().is_empty());
}

#[tokio::test]
async fn instructions_and_system_messages_go_first() {
    let provider = Arc::new(ScriptedProvider::new(vec![answer("one"), answer("two")]));
    let mut session = session(&provider).with_instructions("Be terse.");

    session.ask("first", AskOptions::default()).await.unwrap();
    session.ask("second", AskOptions::default()).await.unwrap();

    let messages = &provider.requests()[1].messages;
    assert_eq!(messages[0].role, MessageRole::System);
    assert_eq!(messages[0].content_text(), Some("Be terse."));
    assert_eq!(
        messages.iter().filter(|m| m.role == MessageRole::System).count(),
        1
    );
    assert_eq!(messages.len(), 4);
    // Instructions are not part of history.
    assert_eq!(session.history().len(), 4);
}

#[tokio::test]
async fn usage_accumulates_per_turn_and_session() {
    let pricing = Pricing::new(1.0, 2.0);
    let capabilities = StaticCapabilities::new()
        .with_fallback(ModelInfo::all().with_pricing(pricing));
    let provider = Arc::new(
        ScriptedProvider::new(vec![weather_call("1"), answer("sunny"), answer("again")])
            .with_capabilities(capabilities),
    );
    let mut session = session(&provider).with_tool(weather_tool());

    let reply = session.ask("weather", AskOptions::default()).await.unwrap();
    let turn = reply.usage.unwrap();
    assert_eq!((turn.input_tokens, turn.output_tokens), (30, 12));
    let expected = (30.0 * 1.0 + 12.0 * 2.0) / 1_000_000.0;
    assert!((turn.cost.unwrap() - expected).abs() < 1e-12);

    session.ask("again", AskOptions::default()).await.unwrap();
    assert_eq!(session.total_usage().input_tokens, 50);
    assert_eq!(session.total_usage().output_tokens, 19);
    assert_eq!(
        session.last_response().map(|r| r.content.as_str()),
        Some("again")
    );
}

#[tokio::test]
async fn events_fire_once_per_assistant_message() {
    let new_messages = Arc::new(AtomicUsize::new(0));
    let end_messages = Arc::new(AtomicUsize::new(0));
    let tool_ends = Arc::new(AtomicUsize::new(0));

    let provider = Arc::new(ScriptedProvider::new(vec![weather_call("1"), answer("sunny")]));
    let (n, e, t) = (new_messages.clone(), end_messages.clone(), tool_ends.clone());
    let mut session = session(&provider)
        .with_tool(weather_tool())
        .on_new_message(move || {
            n.fetch_add(1, Ordering::SeqCst);
        })
        .on_end_message(move |_| {
            e.fetch_add(1, Ordering::SeqCst);
        })
        .on_tool_call_end(move |call, result| {
            assert_eq!(call.name(), "get_weather");
            assert!(result.contains("22"));
            t.fetch_add(1, Ordering::SeqCst);
        });

    session.ask("weather", AskOptions::default()).await.unwrap();

    assert_eq!(new_messages.load(Ordering::SeqCst), 2);
    assert_eq!(end_messages.load(Ordering::SeqCst), 2);
    assert_eq!(tool_ends.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn vision_needs_capability() {
    let capabilities = StaticCapabilities::new()
        .with_model("mock", ModelInfo::new().with_tools());
    let provider = Arc::new(
        ScriptedProvider::new(vec![answer("a cat")]).with_capabilities(capabilities),
    );
    let mut session = session(&provider);
    let content = vec![
        ContentPart::text("What is this?"),
        ContentPart::image_url("https://example.com/cat.png"),
    ];

    let err = session
        .ask(content, AskOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        LlmError::CapabilityError { ref provider, ref model, ref feature }
            if provider == "scripted" && model == MODEL && feature == "vision"
    ));
    assert_eq!(provider.calls(), 0);
    assert!(session.history().is_empty());
}

#[tokio::test]
#[traced_test]
async fn capability_override_warns_and_proceeds() {
    let capabilities = StaticCapabilities::new()
        .with_model("mock", ModelInfo::new().with_tools());
    let provider = Arc::new(
        ScriptedProvider::new(vec![answer("a cat")]).with_capabilities(capabilities),
    );
    let mut session = session(&provider);
    let content = vec![
        ContentPart::text("What is this?"),
        ContentPart::image_url("https://example.com/cat.png"),
    ];

    let reply = session
        .ask(content, AskOptions::new().with_assume_model_exists(true))
        .await
        .unwrap();

    assert_eq!(reply.content, "a cat");
    assert_eq!(provider.calls(), 1);
    assert!(logs_contain("capability check overridden"));
}

#[tokio::test]
async fn structured_output_is_parsed() {
    let provider = Arc::new(ScriptedProvider::new(vec![answer(
        "```json\n{\"city\": \"Paris\", \"temperature\": 22}\n```",
    )]));
    let schema = OutputSchema::new(
        "forecast",
        json!({
            "type": "object",
            "properties": {
                "city": {"type": "string"},
                "temperature": {"type": "number"}
            },
            "required": ["city", "temperature"]
        }),
    );
    let mut session = session(&provider).with_schema(schema);

    let reply = session.ask("forecast", AskOptions::default()).await.unwrap();

    assert_eq!(reply.parsed, Some(json!({"city": "Paris", "temperature": 22})));
    assert!(matches!(
        provider.requests()[0].response_format,
        Some(ResponseFormat::JsonSchema(_))
    ));
}

#[tokio::test]
async fn provider_errors_propagate_without_touching_history() {
    let provider = Arc::new(ScriptedProvider::new(Vec::new()));
    let mut session = session(&provider);

    let err = session.ask("hello", AskOptions::default()).await.unwrap_err();

    assert!(matches!(err, LlmError::InternalError(_)));
    assert!(session.history().is_empty());
    assert!(session.last_response().is_none());
}

fn fast_retry(max_attempts: u32) -> RetryOptions {
    RetryOptions::default().with_policy(
        RetryPolicy::new()
            .with_max_attempts(max_attempts)
            .with_initial_delay(Duration::from_millis(1))
            .with_jitter(false),
    )
}

#[tokio::test]
async fn slow_provider_times_out() {
    let provider = Arc::new(
        ScriptedProvider::new(vec![answer("too late")])
            .with_delay(Duration::from_millis(500)),
    );
    let mut session = session(&provider).with_request_timeout(Duration::from_millis(10));

    let err = session.ask("hello", AskOptions::default()).await.unwrap_err();

    assert!(matches!(err, LlmError::TimeoutError(_)));
    assert!(session.history().is_empty());
    assert!(session.last_response().is_none());
}

#[tokio::test]
async fn per_call_timeout_overrides_session_default() {
    let provider = Arc::new(
        ScriptedProvider::new(vec![answer("too late")])
            .with_delay(Duration::from_millis(500)),
    );
    let mut session = session(&provider);

    let options = AskOptions::new().with_request_timeout(Duration::from_millis(10));
    let err = session.ask("hello", options).await.unwrap_err();

    assert!(matches!(err, LlmError::TimeoutError(_)));
}

#[tokio::test]
async fn transient_provider_errors_are_retried() {
    let provider = Arc::new(
        ScriptedProvider::new(vec![answer("recovered")])
            .failing_first(vec![LlmError::api_error(503, "scripted", "overloaded")]),
    );
    let mut session = ChatSession::new(provider.clone(), MODEL)
        .with_retry(fast_retry(3));

    let reply = session.ask("hello", AskOptions::default()).await.unwrap();

    assert_eq!(reply.content, "recovered");
    assert_eq!(provider.calls(), 2);
    assert_eq!(session.history().len(), 2);
}

#[tokio::test]
async fn rate_limits_are_retried_within_the_attempt_budget() {
    let provider = Arc::new(
        ScriptedProvider::new(vec![answer("never")]).failing_first(vec![
            LlmError::RateLimitError("slow down".into()),
            LlmError::RateLimitError("slow down".into()),
        ]),
    );
    let mut session = ChatSession::new(provider.clone(), MODEL)
        .with_retry(fast_retry(2));

    let err = session.ask("hello", AskOptions::default()).await.unwrap_err();

    assert!(matches!(err, LlmError::RateLimitError(_)));
    assert_eq!(provider.calls(), 2);
    assert!(session.history().is_empty());
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let provider = Arc::new(
        ScriptedProvider::new(vec![answer("never")])
            .failing_first(vec![LlmError::api_error(400, "scripted", "bad request")]),
    );
    let mut session = ChatSession::new(provider.clone(), MODEL)
        .with_retry(fast_retry(3));

    let err = session.ask("hello", AskOptions::default()).await.unwrap_err();

    assert!(matches!(err, LlmError::ApiError { code: 400, .. }));
    assert_eq!(provider.calls(), 1);
}
