//! C3: prompt -> `TaskRequirements`. Patterns are loaded once from YAML and
//! compiled to case-insensitive regexes; results are memoized in the
//! analyzer cache (`router_core::cache::AnalyzerCache`) keyed by prompt hash.
//!
//! Grounded on the "context model" / capability-matching selection logic in
//! the provider-integration system this codebase's lineage carries
//! (weighted pattern scoring per task, argmax + declaration-order tie
//! break), reworked as a pure function plus an explicit cache rather than a
//! stateful "selector" object.

use regex::RegexBuilder;
use router_core::cache::AnalyzerCache;
use router_core::error::{ConfigError, RouterResult};
use router_core::types::{Priority, TaskRequirements, TaskType};
use std::path::Path;

/// One `(pattern, weight)` rule for one task type, compiled once at load.
struct CompiledPattern {
    regex: regex::Regex,
    weight: f64,
}

/// Compiled, case-insensitive pattern table plus the analyzer's result cache.
pub struct TaskAnalyzer {
    patterns: Vec<(TaskType, Vec<CompiledPattern>)>,
    cache: AnalyzerCache<TaskRequirements>,
}

impl TaskAnalyzer {
    /// Build an analyzer from `(TaskType, [(pattern, weight)])` pairs in
    /// declaration order; used directly by tests and by `load`/`from_yaml_str`
    /// once they've parsed the file.
    pub fn from_rules(
        rules: Vec<(TaskType, Vec<(&str, f64)>)>,
        cache_capacity: usize,
    ) -> RouterResult<Self> {
        let mut patterns = Vec::with_capacity(rules.len());
        for (task_type, pats) in rules {
            let mut compiled = Vec::with_capacity(pats.len());
            for (pattern, weight) in pats {
                let regex = RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| ConfigError::InvalidValue {
                        field: "task_patterns".to_string(),
                        value: pattern.to_string(),
                        reason: e.to_string(),
                    })?;
                compiled.push(CompiledPattern { regex, weight });
            }
            patterns.push((task_type, compiled));
        }
        Ok(TaskAnalyzer {
            patterns,
            cache: AnalyzerCache::new(cache_capacity),
        })
    }

    /// Identity-pattern fallback used when no pattern file is available
    /// (§4.1: "the analyzer never fails; on pattern file absence it falls
    /// back to one identity pattern `.* -> general @ 0.1`").
    pub fn fallback(cache_capacity: usize) -> Self {
        TaskAnalyzer::from_rules(vec![(TaskType::General, vec![(".*", 0.1)])], cache_capacity)
            .expect("fallback pattern is always valid")
    }

    /// Load and compile a pattern file; falls back to the identity pattern if
    /// the file is missing, never returning an error to the caller.
    pub fn load_or_fallback(path: impl AsRef<Path>, cache_capacity: usize) -> Self {
        match std::fs::read_to_string(path.as_ref()) {
            Ok(content) => match Self::from_yaml_str(&content, cache_capacity) {
                Ok(analyzer) => analyzer,
                Err(e) => {
                    log::warn!(
                        "failed to parse task pattern file {}: {e}; falling back to identity pattern",
                        path.as_ref().display()
                    );
                    Self::fallback(cache_capacity)
                }
            },
            Err(_) => {
                log::warn!(
                    "task pattern file {} not found; falling back to identity pattern",
                    path.as_ref().display()
                );
                Self::fallback(cache_capacity)
            }
        }
    }

    /// Parses via `serde_yaml::Value` rather than a typed struct so that the
    /// tie-break order from §4.1 ("deterministic declaration order in YAML")
    /// survives: `serde_yaml::Mapping` preserves insertion order, while a
    /// `BTreeMap` would silently re-sort task types alphabetically.
    fn from_yaml_str(content: &str, cache_capacity: usize) -> RouterResult<Self> {
        let doc: serde_yaml::Value = serde_yaml::from_str(content)?;
        let mapping = doc
            .get("task_patterns")
            .and_then(|v| v.as_mapping())
            .ok_or_else(|| ConfigError::InvalidFormat {
                file: "task_patterns.yaml".to_string(),
                reason: "missing top-level `task_patterns` mapping".to_string(),
            })?;

        let mut owned_patterns: Vec<(TaskType, Vec<(String, f64)>)> = Vec::with_capacity(mapping.len());
        for (key, value) in mapping {
            let task_str = key.as_str().ok_or_else(|| ConfigError::InvalidFormat {
                file: "task_patterns.yaml".to_string(),
                reason: "task_patterns key is not a string".to_string(),
            })?;
            let task_type: TaskType = task_str.parse().map_err(|_| ConfigError::InvalidValue {
                field: "task_patterns".to_string(),
                value: task_str.to_string(),
                reason: "unknown task type".to_string(),
            })?;
            let rows = value.as_sequence().ok_or_else(|| ConfigError::InvalidFormat {
                file: "task_patterns.yaml".to_string(),
                reason: format!("task_patterns.{task_str} is not a list"),
            })?;
            let mut pats = Vec::with_capacity(rows.len());
            for row in rows {
                let pair = row.as_sequence().ok_or_else(|| ConfigError::InvalidFormat {
                    file: "task_patterns.yaml".to_string(),
                    reason: format!("task_patterns.{task_str} entry is not a [pattern, weight] pair"),
                })?;
                let pattern = pair
                    .first()
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| ConfigError::InvalidFormat {
                        file: "task_patterns.yaml".to_string(),
                        reason: format!("task_patterns.{task_str} pattern is not a string"),
                    })?
                    .to_string();
                let weight = pair
                    .get(1)
                    .and_then(|v| v.as_f64())
                    .ok_or_else(|| ConfigError::InvalidFormat {
                        file: "task_patterns.yaml".to_string(),
                        reason: format!("task_patterns.{task_str} weight is not a number"),
                    })?;
                pats.push((pattern, weight));
            }
            owned_patterns.push((task_type, pats));
        }

        let rules: Vec<(TaskType, Vec<(&str, f64)>)> = owned_patterns
            .iter()
            .map(|(t, pats)| (*t, pats.iter().map(|(p, w)| (p.as_str(), *w)).collect()))
            .collect();
        Self::from_rules(rules, cache_capacity)
    }

    /// Pure classification step, ignoring the cache. Exposed separately so
    /// tests can assert on scoring without touching cache state.
    fn classify(&self, prompt: &str) -> (TaskType, f64) {
        let mut best: Option<(TaskType, f64)> = None;
        for (task_type, pats) in &self.patterns {
            let mut score = 0.0f64;
            for pat in pats {
                if pat.regex.is_match(prompt) {
                    score = score.max(pat.weight);
                }
            }
            if score <= 0.0 {
                continue;
            }
            match &best {
                Some((_, best_score)) if *best_score >= score => {}
                _ => best = Some((*task_type, score)),
            }
        }
        best.unwrap_or((TaskType::General, 0.1))
    }

    fn derive_capabilities(prompt: &str) -> (bool, bool, Option<u32>) {
        let lower = prompt.to_ascii_lowercase();
        let needs_function_calling = ["tool", "api", "function", "call the", "invoke"]
            .iter()
            .any(|kw| lower.contains(kw));
        let needs_vision = ["image", "picture", "photo", "screenshot", "diagram"]
            .iter()
            .any(|kw| lower.contains(kw));

        let word_count = prompt.split_whitespace().count();
        let min_context_window = if word_count == 0 {
            None
        } else {
            // words * 4 bytes / 3 ~= tokens (§4.1), rounded to the nearest 8k.
            let estimated_tokens = (word_count as f64 * 4.0 / 3.0).ceil() as u32;
            let rounded = ((estimated_tokens + 4095) / 8192).max(1) * 8192;
            Some(rounded)
        };
        (needs_function_calling, needs_vision, min_context_window)
    }

    /// `Analyze(prompt) -> TaskRequirements` (§4.1). Pure and idempotent from
    /// the caller's point of view: repeated calls on the same prompt return
    /// a bit-for-bit identical result (L1), served from cache after the
    /// first call.
    pub fn analyze(&self, prompt: &str) -> TaskRequirements {
        if let Some(cached) = self.cache.get(prompt) {
            return cached;
        }

        let (task_type, confidence) = self.classify(prompt);
        let (needs_function_calling, needs_vision, min_context_window) =
            Self::derive_capabilities(prompt);

        let requirements = TaskRequirements {
            task_type,
            confidence,
            min_context_window,
            needs_function_calling,
            needs_vision,
            priority: Priority::Balanced,
        };

        self.cache.insert(prompt, requirements.clone());
        requirements
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Drop every cached result; called on explicit pattern-file reload.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzer() -> TaskAnalyzer {
        TaskAnalyzer::from_rules(
            vec![
                (
                    TaskType::CodeGeneration,
                    vec![("write (a|some) (function|code)", 0.8), ("implement", 0.6)],
                ),
                (TaskType::Debugging, vec![("fix (this|the) bug", 0.9), ("why (is|does).*fail", 0.7)]),
                (TaskType::Reasoning, vec![("explain how", 0.85), ("why does .* work", 0.6)]),
            ],
            16,
        )
        .unwrap()
    }

    #[test]
    fn empty_prompt_is_general_with_low_confidence() {
        let a = analyzer();
        let reqs = a.analyze("");
        assert_eq!(reqs.task_type, TaskType::General);
        assert!((reqs.confidence - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn matches_highest_weight_pattern() {
        let a = analyzer();
        let reqs = a.analyze("please write a function that sorts a list");
        assert_eq!(reqs.task_type, TaskType::CodeGeneration);
        assert!((reqs.confidence - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn repeated_call_is_served_from_cache_bit_for_bit() {
        let a = analyzer();
        let first = a.analyze("explain how TCP congestion control works");
        let second = a.analyze("explain how TCP congestion control works");
        assert_eq!(first.task_type, second.task_type);
        assert!((first.confidence - second.confidence).abs() < f64::EPSILON);
        assert_eq!(a.cache_len(), 1);
    }

    #[test]
    fn derives_function_calling_need() {
        let a = analyzer();
        let reqs = a.analyze("call the weather API to get the forecast");
        assert!(reqs.needs_function_calling);
    }

    #[test]
    fn derives_vision_need() {
        let a = analyzer();
        let reqs = a.analyze("describe what's in this screenshot");
        assert!(reqs.needs_vision);
    }

    #[test]
    fn min_context_window_rounds_to_nearest_8k() {
        let a = analyzer();
        let long_prompt = "word ".repeat(4000);
        let reqs = a.analyze(&long_prompt);
        assert!(reqs.min_context_window.unwrap() % 8192 == 0);
        assert!(reqs.min_context_window.unwrap() > 0);
    }

    #[test]
    fn fallback_analyzer_never_fails() {
        let a = TaskAnalyzer::fallback(16);
        let reqs = a.analyze("anything at all");
        assert_eq!(reqs.task_type, TaskType::General);
    }

    #[test]
    fn parses_yaml_preserving_declaration_order() {
        let yaml = r#"
task_patterns:
  debugging:
    - ["fix (this|the) bug", 0.9]
  code_generation:
    - ["write (a|some) (function|code)", 0.9]
"#;
        let analyzer = TaskAnalyzer::from_yaml_str(yaml, 16).unwrap();
        // Both patterns score 0.9 on this prompt; declaration order (debugging
        // first) must win the tie, matching §4.1's deterministic tie-break.
        let reqs = analyzer.analyze("please fix the bug in this function");
        assert_eq!(reqs.task_type, TaskType::Debugging);
    }

    #[test]
    fn load_or_fallback_falls_back_on_missing_file() {
        let analyzer = TaskAnalyzer::load_or_fallback("/nonexistent/path/patterns.yaml", 16);
        let reqs = analyzer.analyze("anything");
        assert_eq!(reqs.task_type, TaskType::General);
        assert!((reqs.confidence - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn clear_cache_resets_length() {
        let a = analyzer();
        a.analyze("implement a parser");
        assert_eq!(a.cache_len(), 1);
        a.clear_cache();
        assert_eq!(a.cache_len(), 0);
    }
}
