//! Model Scorer: turns one [`TaskRequirements`] plus a candidate
//! [`ModelDescriptor`] into a single comparable score in `[0, 1]`.
//!
//! Scoring is a weighted sum of four sub-scores (context, speed, cost,
//! capability), with hard filters applied first so an unsuitable model never
//! reaches the weighted sum at all. This mirrors the multi-factor selection
//! the teacher's `IntelligentProviderSelector` does ad hoc across scattered
//! `HashMap<String, f64>` rankings, but collapsed here into one pure function
//! over a fixed, typed weight set instead of runtime-adjusted "adaptive
//! weights".

use router_core::config::ScorerWeights;
use router_core::types::{Capability, ModelDescriptor, Priority, TaskRequirements};

/// Sub-scores plus the final weighted total for one model, kept around so
/// callers (and tests) can inspect why a model scored the way it did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBreakdown {
    pub context: f64,
    pub speed: f64,
    pub cost: f64,
    pub capability: f64,
    pub total: f64,
}

impl ScoreBreakdown {
    fn zero() -> Self {
        ScoreBreakdown {
            context: 0.0,
            speed: 0.0,
            cost: 0.0,
            capability: 0.0,
            total: 0.0,
        }
    }
}

/// The capability set a task requires, derived from the boolean flags on
/// [`TaskRequirements`]. Kept separate from the scorer's formula so the set
/// of hard capability requirements is explicit and easy to extend.
fn required_capabilities(reqs: &TaskRequirements) -> Vec<Capability> {
    let mut required = Vec::new();
    if reqs.needs_function_calling {
        required.push(Capability::FunctionCalling);
    }
    if reqs.needs_vision {
        required.push(Capability::Vision);
    }
    required
}

fn context_sub_score(model: &ModelDescriptor, reqs: &TaskRequirements) -> f64 {
    match reqs.min_context_window {
        None => 1.0,
        Some(min) if min == 0 => 1.0,
        Some(min) if model.context_window >= min => 1.0,
        Some(min) => model.context_window as f64 / min as f64,
    }
}

fn speed_sub_score(model: &ModelDescriptor) -> f64 {
    model.scores.speed as f64 / 100.0
}

fn cost_sub_score(model: &ModelDescriptor) -> f64 {
    model.cost_tier.price_rank()
}

fn capability_sub_score(model: &ModelDescriptor, reqs: &TaskRequirements) -> f64 {
    let required = required_capabilities(reqs);
    if required.is_empty() {
        return 0.5;
    }
    let matched = required
        .iter()
        .filter(|cap| model.has_capability(**cap))
        .count();
    matched as f64 / required.len() as f64
}

/// Priority doubles the weight of its matching sub-score and renormalizes,
/// so the weights always sum to 1.0 regardless of which priority is active.
fn effective_weights(weights: &ScorerWeights, priority: Priority) -> ScorerWeights {
    let mut w = *weights;
    match priority {
        Priority::Quality => w.capability *= 2.0,
        Priority::Speed => w.speed *= 2.0,
        Priority::Cost => w.cost *= 2.0,
        Priority::Balanced => {}
    }
    let sum = w.context + w.speed + w.cost + w.capability;
    if sum > 0.0 {
        w.context /= sum;
        w.speed /= sum;
        w.cost /= sum;
        w.capability /= sum;
    }
    w
}

/// Whether a model passes the scorer's hard filters: every required
/// capability present, and (per §4.2) credentials available for its
/// provider, checked against the client pool's availability snapshot.
/// `available_providers` is `None` when no pool is wired in yet (e.g. in
/// isolated unit tests), in which case the provider check is skipped.
pub fn hard_filters_pass(
    model: &ModelDescriptor,
    reqs: &TaskRequirements,
    available_providers: Option<&[router_core::types::Provider]>,
) -> bool {
    let required = required_capabilities(reqs);
    let capable = required.iter().all(|cap| model.has_capability(*cap));
    let available = available_providers
        .map(|available| available.contains(&model.provider))
        .unwrap_or(true);
    capable && available
}

/// Score one model against one set of task requirements. Returns a
/// zeroed-out breakdown (total 0.0) when the model fails a hard filter,
/// matching the "Score returns 0" rule rather than erroring — the selector
/// is the one that decides what to do with a zero score.
pub fn score(
    model: &ModelDescriptor,
    reqs: &TaskRequirements,
    weights: &ScorerWeights,
    available_providers: Option<&[router_core::types::Provider]>,
) -> ScoreBreakdown {
    if !hard_filters_pass(model, reqs, available_providers) {
        return ScoreBreakdown::zero();
    }
    let w = effective_weights(weights, reqs.priority);
    let context = context_sub_score(model, reqs);
    let speed = speed_sub_score(model);
    let cost = cost_sub_score(model);
    let capability = capability_sub_score(model, reqs);
    let total = w.context * context + w.speed * speed + w.cost * cost + w.capability * capability;
    ScoreBreakdown {
        context,
        speed,
        cost,
        capability,
        total,
    }
}
