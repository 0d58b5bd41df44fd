//! Pure cost computation shared by the orchestrator's cost tracker (C10).
//!
//! This module only computes and validates; it does not own the ring buffer
//! or daily-total state machine (`router-orchestrator::cost_tracker` does) —
//! that split mirrors the registry/scorer split elsewhere in this codebase:
//! keep pure math separate from the component that owns mutable state.

use crate::error::{CostError, RouterResult};
use crate::price_table::ModelPrice;
use crate::types::Usage;

/// Dollar breakdown for one completed request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cost {
    pub input: f64,
    pub output: f64,
    pub total: f64,
}

/// Smallest cost difference treated as equal, to absorb floating-point error
/// in the `total == input + output` consistency check.
const COST_EPSILON: f64 = 1e-8;

/// Compute cost from aggregated usage and a price, enforcing:
/// - zero tokens with non-zero cost is impossible by construction (cost is
///   derived from tokens, never supplied independently), so this function
///   instead validates the inverse: non-zero cost requires non-zero tokens.
/// - no negative cost component.
pub fn calculate_cost(usage: Usage, price: ModelPrice) -> RouterResult<Cost> {
    let input = (usage.prompt_tokens as f64 / 1000.0) * price.input_per_1k;
    let output = (usage.completion_tokens as f64 / 1000.0) * price.output_per_1k;
    let total = input + output;

    if input < 0.0 || output < 0.0 {
        return Err(CostError::NegativeCost(total).into());
    }

    if (total - (input + output)).abs() > COST_EPSILON {
        return Err(CostError::InconsistentTotal {
            total,
            computed: input + output,
        }
        .into());
    }

    if total > 0.0 && usage.total_tokens == 0 {
        return Err(crate::error::RouterError::BillingIntegrity {
            detail: format!("non-zero cost ${total:.8} with zero aggregated tokens"),
        });
    }

    Ok(Cost {
        input,
        output,
        total,
    })
}

/// Policy limits applied on top of a raw cost computation. Violating these is
/// a `CostError`, distinct from the billing-integrity taxonomy: the embedding
/// application decides whether it is fatal.
#[derive(Debug, Clone, Copy)]
pub struct CostLimits {
    pub max_single_request: f64,
    pub max_daily_total: f64,
    pub warn_threshold: f64,
}

impl Default for CostLimits {
    fn default() -> Self {
        CostLimits {
            max_single_request: 10.0,
            max_daily_total: 100.0,
            warn_threshold: 1.0,
        }
    }
}

/// Validate a single-request cost against the configured limits, logging a
/// warning past `warn_threshold` without failing.
pub fn validate_single_request(cost: Cost, limits: &CostLimits) -> RouterResult<()> {
    if cost.total > limits.max_single_request {
        return Err(CostError::SingleRequestLimitExceeded {
            cost: cost.total,
            limit: limits.max_single_request,
        }
        .into());
    }
    if cost.total > limits.warn_threshold {
        log::warn!(
            "request cost ${:.6} exceeds warn threshold ${:.2}",
            cost.total,
            limits.warn_threshold
        );
    }
    Ok(())
}

/// Validate a running daily total against the configured daily limit.
pub fn validate_daily_total(daily_total: f64, limits: &CostLimits) -> RouterResult<()> {
    if daily_total > limits.max_daily_total {
        return Err(CostError::DailyLimitExceeded {
            cost: daily_total,
            limit: limits.max_daily_total,
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn computes_cost_from_usage_and_price() {
        let usage = Usage::new(1000, 500);
        let price = ModelPrice {
            input_per_1k: 0.0025,
            output_per_1k: 0.01,
        };
        let cost = calculate_cost(usage, price).unwrap();
        assert!((cost.input - 0.0025).abs() < f64::EPSILON);
        assert!((cost.output - 0.005).abs() < f64::EPSILON);
        assert!((cost.total - 0.0075).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_tokens_gives_zero_cost() {
        let usage = Usage::new(0, 0);
        let price = ModelPrice {
            input_per_1k: 0.0025,
            output_per_1k: 0.01,
        };
        let cost = calculate_cost(usage, price).unwrap();
        assert_eq!(cost.total, 0.0);
    }

    #[test]
    fn single_request_limit_enforced() {
        let cost = Cost {
            input: 5.0,
            output: 6.0,
            total: 11.0,
        };
        let limits = CostLimits::default();
        assert!(validate_single_request(cost, &limits).is_err());
    }

    #[test]
    fn daily_limit_enforced() {
        let limits = CostLimits::default();
        assert!(validate_daily_total(150.0, &limits).is_err());
        assert!(validate_daily_total(50.0, &limits).is_ok());
    }
}
