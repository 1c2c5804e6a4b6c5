//! # Confab
//!
//! Provider-agnostic chat sessions for LLM APIs.
//!
//! A [`ChatSession`] binds one [`ChatProvider`] and one model, keeps the
//! conversation history, and runs each turn to completion:
//!
//! - **Tool loop**: tool calls requested by the model are executed, their
//!   results fed back, and the model asked again, up to a bounded number of
//!   round trips.
//! - **Streaming**: partial output is surfaced as it arrives and aggregated
//!   into the same response `ask` would have returned.
//! - **Middleware**: global then session middleware observe and may rewrite
//!   every request and response, and decide what a failed tool call means.
//! - **Capability checks**: requests needing vision, tools, structured output
//!   or reasoning are rejected before anything is sent when the model lacks
//!   the feature.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use confab::prelude::*;
//! use serde_json::json;
//!
//! let weather = ToolDefinition::new(
//!     "get_weather",
//!     "Current weather for a city",
//!     json!({"type": "object", "properties": {"location": {"type": "string"}}}),
//!     |_args| async move { Ok(json!({"temperature": 22})) },
//! );
//!
//! let mut session = ChatSession::new(Arc::new(my_provider), "gpt-4o").with_tool(weather);
//! let reply = session.ask("Weather in Paris?", AskOptions::default()).await?;
//! assert_eq!(session.history().len(), 4);
//! ```

#![deny(unsafe_code)]

pub mod capabilities;
pub mod config;
pub mod error;
pub mod logging;
pub mod middleware;
pub mod retry;
pub mod session;
pub mod streaming;
pub mod tools;
pub mod traits;
pub mod types;
pub mod validation;

pub use capabilities::{ModelInfo, StaticCapabilities};
pub use error::{ErrorCategory, LlmError, ToolErrorKind};
pub use middleware::{Middleware, MiddlewareContext, MiddlewarePipeline, ToolErrorAction};
pub use session::{AskOptions, ChatSession, SessionEvents};
pub use streaming::{ChatStream, StreamAggregator};
pub use tools::{ToolDefinition, ToolExecutionMode, ToolRegistry, TypedTool};
pub use traits::{ChatProvider, ModelCapabilities};

/// Commonly used types.
pub mod prelude {
    pub use crate::capabilities::{ModelInfo, StaticCapabilities};
    pub use crate::error::{LlmError, ToolErrorKind};
    pub use crate::middleware::{
        CostGuardMiddleware, Middleware, MiddlewareContext, PiiMaskingMiddleware,
        ToolErrorAction, UsageLoggingMiddleware,
    };
    pub use crate::session::{AskOptions, ChatSession};
    pub use crate::streaming::ChatStream;
    pub use crate::tools::{ToolDefinition, ToolExecutionMode, TypedTool};
    pub use crate::traits::{ChatProvider, ModelCapabilities};
    pub use crate::types::*;
}

static_assertions::assert_impl_all!(ChatSession: Send, Sync);
static_assertions::assert_impl_all!(LlmError: Send, Sync, Clone);

// Fails to compile if a turn future stops being `Send`.
#[allow(dead_code)]
fn _turn_futures_are_send(session: &mut ChatSession) {
    fn is_send<T: Send>(_: T) {}
    is_send(session.ask("", AskOptions::default()));
    is_send(session.stream("", AskOptions::default()));
}
