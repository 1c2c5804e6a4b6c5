use std::sync::Arc;

use super::{Middleware, MiddlewareContext, ToolErrorAction};
use crate::error::LlmError;
use crate::types::{ChatResponse, ToolCall};

/// Ordered middleware chain for one session call.
#[derive(Clone, Default)]
pub struct MiddlewarePipeline {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl std::fmt::Debug for MiddlewarePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.middlewares.iter().map(|mw| mw.name()))
            .finish()
    }
}

impl MiddlewarePipeline {
    /// Global middleware first, then session middleware.
    pub fn new(global: &[Arc<dyn Middleware>], session: &[Arc<dyn Middleware>]) -> Self {
        Self {
            middlewares: global
                .iter()
                .chain(session.iter())
                .cloned()
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.middlewares
            .iter()
            .map(|mw| mw.name().to_string())
            .collect()
    }

    /// Apply `on_request` across middlewares in order; the first error aborts.
    pub async fn apply_request_chain(&self, ctx: &mut MiddlewareContext) -> Result<(), LlmError> {
        for mw in &self.middlewares {
            mw.on_request(ctx).await.inspect_err(|e| {
                tracing::debug!(middleware = mw.name(), "on_request aborted: {}", e);
            })?;
        }
        Ok(())
    }

    /// Apply `on_response` across middlewares in order, threading the response.
    pub async fn apply_response_chain(
        &self,
        ctx: &MiddlewareContext,
        mut response: ChatResponse,
    ) -> Result<ChatResponse, LlmError> {
        for mw in &self.middlewares {
            response = mw.on_response(ctx, response).await.inspect_err(|e| {
                tracing::debug!(middleware = mw.name(), "on_response aborted: {}", e);
            })?;
        }
        Ok(response)
    }

    /// Ask every middleware about a tool failure; the first answer wins.
    pub async fn resolve_tool_error(
        &self,
        ctx: &MiddlewareContext,
        call: &ToolCall,
        error: &LlmError,
    ) -> Option<ToolErrorAction> {
        let mut decision = None;
        for mw in &self.middlewares {
            let answer = mw.on_tool_call_error(ctx, call, error).await;
            if decision.is_none() {
                decision = answer;
            }
        }
        decision
    }
}
