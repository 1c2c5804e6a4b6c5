//! Token usage and pricing

use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

/// Token usage for one response, one turn, or a whole session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_tokens: Option<u32>,
    /// Cost in USD, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
}

impl Usage {
    /// Create usage from input/output counts; total is their sum.
    pub const fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
            cached_tokens: None,
            cost: None,
        }
    }

    pub const fn with_cached_tokens(mut self, cached: u32) -> Self {
        self.cached_tokens = Some(cached);
        self
    }

    pub const fn with_cost(mut self, cost: f64) -> Self {
        self.cost = Some(cost);
        self
    }

    pub const fn is_empty(&self) -> bool {
        self.input_tokens == 0 && self.output_tokens == 0 && self.total_tokens == 0
    }
}

fn add_opt<T: Add<Output = T> + Copy>(a: Option<T>, b: Option<T>) -> Option<T> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a + b),
        (a, b) => a.or(b),
    }
}

impl Add for Usage {
    type Output = Usage;

    fn add(self, rhs: Usage) -> Usage {
        Usage {
            input_tokens: self.input_tokens + rhs.input_tokens,
            output_tokens: self.output_tokens + rhs.output_tokens,
            total_tokens: self.total_tokens + rhs.total_tokens,
            cached_tokens: add_opt(self.cached_tokens, rhs.cached_tokens),
            cost: add_opt(self.cost, rhs.cost),
        }
    }
}

impl AddAssign<&Usage> for Usage {
    fn add_assign(&mut self, rhs: &Usage) {
        self.input_tokens += rhs.input_tokens;
        self.output_tokens += rhs.output_tokens;
        self.total_tokens += rhs.total_tokens;
        self.cached_tokens = add_opt(self.cached_tokens, rhs.cached_tokens);
        self.cost = add_opt(self.cost, rhs.cost);
    }
}

/// Per-million-token prices in USD.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
    /// Rate for cached input tokens; falls back to the input rate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_input_per_million: Option<f64>,
}

impl Pricing {
    pub const fn new(input_per_million: f64, output_per_million: f64) -> Self {
        Self {
            input_per_million,
            output_per_million,
            cached_input_per_million: None,
        }
    }

    /// Cost of `usage` under these prices.
    pub fn cost_of(&self, usage: &Usage) -> f64 {
        let cached = usage.cached_tokens.unwrap_or(0).min(usage.input_tokens);
        let uncached = usage.input_tokens - cached;
        let cached_rate = self
            .cached_input_per_million
            .unwrap_or(self.input_per_million);
        (f64::from(uncached) * self.input_per_million
            + f64::from(cached) * cached_rate
            + f64::from(usage.output_tokens) * self.output_per_million)
            / 1_000_000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_accumulates_optional_fields() {
        let mut total = Usage::default();
        total += &Usage::new(100, 50).with_cached_tokens(10);
        total += &Usage::new(200, 100).with_cost(0.5);
        assert_eq!(total.input_tokens, 300);
        assert_eq!(total.output_tokens, 150);
        assert_eq!(total.total_tokens, 450);
        assert_eq!(total.cached_tokens, Some(10));
        assert_eq!(total.cost, Some(0.5));
    }

    #[test]
    fn pricing_discounts_cached_input() {
        let pricing = Pricing {
            input_per_million: 2.0,
            output_per_million: 8.0,
            cached_input_per_million: Some(0.5),
        };
        let usage = Usage::new(1_000_000, 500_000).with_cached_tokens(400_000);
        let cost = pricing.cost_of(&usage);
        // 600k * 2 + 400k * 0.5 + 500k * 8 = 1.2 + 0.2 + 4.0
        assert!((cost - 5.4).abs() < 1e-9);
    }
}
