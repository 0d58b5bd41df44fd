//! Model Selector (C5): turns task requirements into a primary model id plus
//! an ordered fallback chain, consulting the scorer and an optional guide.

use crate::guide::Guide;
use crate::scorer;
use router_core::config::ScorerWeights;
use router_core::error::RouterError;
use router_core::model_registry::ModelRegistry;
use router_core::types::{Provider, TaskRequirements};
use std::collections::HashSet;

pub struct ModelSelector<'a> {
    registry: &'a ModelRegistry,
    guide: &'a Guide,
    weights: ScorerWeights,
    max_fallbacks: usize,
}

impl<'a> ModelSelector<'a> {
    pub fn new(
        registry: &'a ModelRegistry,
        guide: &'a Guide,
        weights: ScorerWeights,
        max_fallbacks: usize,
    ) -> Self {
        ModelSelector {
            registry,
            guide,
            weights,
            max_fallbacks,
        }
    }

    /// `Select(requirements, exclusions) → (primary_id, fallback_ids[])`.
    ///
    /// `available_providers` narrows scoring to providers with resolvable
    /// credentials, mirroring the scorer's hard-filter clause over the
    /// client pool's availability snapshot; pass `None` to skip that check
    /// (e.g. when the pool hasn't been consulted yet).
    pub fn select(
        &self,
        reqs: &TaskRequirements,
        exclusions: &HashSet<String>,
        available_providers: Option<&[Provider]>,
    ) -> Result<(String, Vec<String>), RouterError> {
        let guide_entry = self.guide.entry(reqs.task_type);

        // Step 1: an explicit guide recommendation wins outright if the
        // first recommended id that passes hard filters and isn't excluded
        // exists.
        if let Some(entry) = guide_entry {
            for id in &entry.recommended {
                if exclusions.contains(id) || self.guide.is_blocked(reqs.task_type, id) {
                    continue;
                }
                if let Some(model) = self.registry.get(id) {
                    if scorer::hard_filters_pass(model, reqs, available_providers) {
                        let fallback = self.ranked_fallback(reqs, exclusions, available_providers, Some(id));
                        return Ok((id.clone(), fallback));
                    }
                }
            }
        }

        // Step 2: score every descriptor, drop ≤0 or excluded, sort
        // descending, ties broken by model id.
        let mut ranked = self.score_all(reqs, exclusions, available_providers);
        ranked.retain(|(id, _)| !self.guide.is_blocked(reqs.task_type, id));

        if ranked.is_empty() {
            return Err(RouterError::NoCandidate {
                task_type: reqs.task_type.to_string(),
            });
        }

        let primary = ranked.remove(0).0;
        let fallback = self.ranked_fallback(reqs, exclusions, available_providers, Some(&primary));
        Ok((primary, fallback))
    }

    fn score_all(
        &self,
        reqs: &TaskRequirements,
        exclusions: &HashSet<String>,
        available_providers: Option<&[Provider]>,
    ) -> Vec<(String, f64)> {
        let mut ranked: Vec<(String, f64)> = self
            .registry
            .iter()
            .filter(|m| !exclusions.contains(&m.id))
            .map(|m| {
                let breakdown = scorer::score(m, reqs, &self.weights, available_providers);
                (m.id.clone(), breakdown.total)
            })
            .filter(|(_, total)| *total > 0.0)
            .collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        ranked
    }

    /// Builds the fallback chain for `reqs`: a guide's curated
    /// `fallback_chain` (in declared order) fills slots first, then
    /// score-based ranking fills whatever slots remain, up to
    /// `max_fallbacks`. A chain id that's excluded, blocked, absent from the
    /// registry, or fails a hard filter is skipped rather than aborting the
    /// rest of the chain.
    fn ranked_fallback(
        &self,
        reqs: &TaskRequirements,
        exclusions: &HashSet<String>,
        available_providers: Option<&[Provider]>,
        exclude_primary: Option<&str>,
    ) -> Vec<String> {
        let mut excl = exclusions.clone();
        if let Some(primary) = exclude_primary {
            excl.insert(primary.to_string());
        }

        let mut fallback: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        if let Some(entry) = self.guide.entry(reqs.task_type) {
            for id in &entry.fallback_chain {
                if fallback.len() >= self.max_fallbacks {
                    break;
                }
                if excl.contains(id) || seen.contains(id) || self.guide.is_blocked(reqs.task_type, id) {
                    continue;
                }
                let Some(model) = self.registry.get(id) else {
                    continue;
                };
                if !scorer::hard_filters_pass(model, reqs, available_providers) {
                    continue;
                }
                seen.insert(id.clone());
                fallback.push(id.clone());
            }
        }

        if fallback.len() < self.max_fallbacks {
            let mut ranked = self.score_all(reqs, &excl, available_providers);
            ranked.retain(|(id, _)| !self.guide.is_blocked(reqs.task_type, id) && !seen.contains(id));
            fallback.extend(
                ranked
                    .into_iter()
                    .take(self.max_fallbacks - fallback.len())
                    .map(|(id, _)| id),
            );
        }

        fallback
    }
}
