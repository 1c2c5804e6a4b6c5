//! Ready-made middlewares

mod cost_guard;
mod pii;
mod usage_logging;

pub use cost_guard::CostGuardMiddleware;
pub use pii::{PiiMaskingMiddleware, mask_pii};
pub use usage_logging::{UsageLoggingMiddleware, UsageTotals};
