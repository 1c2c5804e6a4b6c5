use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::LlmError;
use crate::middleware::{Middleware, MiddlewareContext};
use crate::types::{ChatResponse, Usage};

/// Logs every response's usage and keeps a running total.
#[derive(Debug, Default)]
pub struct UsageLoggingMiddleware {
    totals: Mutex<UsageTotals>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UsageTotals {
    pub responses: u64,
    pub usage: Usage,
}

impl UsageLoggingMiddleware {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn totals(&self) -> UsageTotals {
        self.totals
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl Middleware for UsageLoggingMiddleware {
    fn name(&self) -> &str {
        "usage-logging"
    }

    async fn on_response(
        &self,
        ctx: &MiddlewareContext,
        response: ChatResponse,
    ) -> Result<ChatResponse, LlmError> {
        let usage = response.usage.clone().unwrap_or_default();
        {
            let mut totals = self
                .totals
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            totals.responses += 1;
            totals.usage += &usage;
        }
        tracing::info!(
            request_id = %ctx.request_id,
            provider = %ctx.provider,
            model = %ctx.model,
            round = ctx.round,
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            total_tokens = usage.total_tokens,
            cost = usage.cost.unwrap_or_default(),
            "llm usage"
        );
        Ok(response)
    }
}
