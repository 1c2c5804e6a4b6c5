use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::LlmError;
use crate::middleware::{Middleware, MiddlewareContext};
use crate::types::{ChatResponse, Pricing};

/// Aborts once accumulated cost exceeds a budget (USD).
///
/// Cost comes from `Usage::cost` when the response carries it, otherwise from
/// the configured pricing.
#[derive(Debug)]
pub struct CostGuardMiddleware {
    budget: f64,
    pricing: Option<Pricing>,
    spent: Mutex<f64>,
}

impl CostGuardMiddleware {
    pub fn new(budget: f64) -> Self {
        Self {
            budget,
            pricing: None,
            spent: Mutex::new(0.0),
        }
    }

    pub fn with_pricing(mut self, pricing: Pricing) -> Self {
        self.pricing = Some(pricing);
        self
    }

    pub fn spent(&self) -> f64 {
        *self
            .spent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub const fn budget(&self) -> f64 {
        self.budget
    }

    fn over_budget(&self, spent: f64) -> LlmError {
        LlmError::middleware_abort(
            self.name(),
            format!("cost {spent:.6} exceeds budget {:.6}", self.budget),
        )
    }
}

#[async_trait]
impl Middleware for CostGuardMiddleware {
    fn name(&self) -> &str {
        "cost-guard"
    }

    async fn on_request(&self, _ctx: &mut MiddlewareContext) -> Result<(), LlmError> {
        let spent = self.spent();
        if spent > self.budget {
            return Err(self.over_budget(spent));
        }
        Ok(())
    }

    async fn on_response(
        &self,
        ctx: &MiddlewareContext,
        response: ChatResponse,
    ) -> Result<ChatResponse, LlmError> {
        let cost = response.usage.as_ref().and_then(|usage| {
            usage
                .cost
                .or_else(|| self.pricing.map(|pricing| pricing.cost_of(usage)))
        });

        if let Some(cost) = cost {
            let spent = {
                let mut spent = self
                    .spent
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                *spent += cost;
                *spent
            };
            if spent > self.budget {
                tracing::warn!(
                    request_id = %ctx.request_id,
                    spent,
                    budget = self.budget,
                    "cost budget exceeded"
                );
                return Err(self.over_budget(spent));
            }
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Usage;

    fn costly(cost: f64) -> ChatResponse {
        ChatResponse {
            usage: Some(Usage::new(1, 1).with_cost(cost)),
            ..ChatResponse::new("ok")
        }
    }

    #[tokio::test]
    async fn aborts_when_budget_exceeded() {
        let guard = CostGuardMiddleware::new(1.0);
        let mut ctx = MiddlewareContext::new("r", "mock", "m", vec![]);

        guard.on_response(&ctx, costly(0.6)).await.unwrap();
        let err = guard.on_response(&ctx, costly(0.6)).await.unwrap_err();
        assert!(
            matches!(err, LlmError::MiddlewareAbort { ref middleware, .. } if middleware == "cost-guard")
        );

        // Later requests are refused up front.
        assert!(guard.on_request(&mut ctx).await.is_err());
    }

    #[tokio::test]
    async fn falls_back_to_pricing() {
        let guard = CostGuardMiddleware::new(10.0).with_pricing(Pricing::new(1.0, 2.0));
        let ctx = MiddlewareContext::new("r", "mock", "m", vec![]);
        let response = ChatResponse {
            usage: Some(Usage::new(1_000_000, 1_000_000)),
            ..ChatResponse::new("ok")
        };
        guard.on_response(&ctx, response).await.unwrap();
        assert!((guard.spent() - 3.0).abs() < 1e-9);
    }
}
