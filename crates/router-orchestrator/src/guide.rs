//! Optional curated guide: per-task-type recommendations, blocks and a
//! fixed fallback chain that override the scorer's raw ranking. Absent a
//! guide file the selector falls through entirely to scoring (§4.3).

use router_core::error::{ConfigError, RouterResult};
use router_core::types::TaskType;
use std::collections::HashMap;
use std::path::Path;

/// One task type's curated entry.
#[derive(Debug, Clone, Default)]
pub struct GuideEntry {
    pub recommended: Vec<String>,
    pub blocked: Vec<String>,
    pub fallback_chain: Vec<String>,
}

/// `{task_type: {recommended, blocked, fallback_chain}}`, keyed by
/// [`TaskType`] rather than kept as a raw string map once loaded.
#[derive(Debug, Clone, Default)]
pub struct Guide {
    entries: HashMap<TaskType, GuideEntry>,
}

impl Guide {
    pub fn empty() -> Self {
        Guide {
            entries: HashMap::new(),
        }
    }

    pub fn entry(&self, task_type: TaskType) -> Option<&GuideEntry> {
        self.entries.get(&task_type)
    }

    pub fn is_blocked(&self, task_type: TaskType, model_id: &str) -> bool {
        self.entries
            .get(&task_type)
            .map(|e| e.blocked.iter().any(|id| id == model_id))
            .unwrap_or(false)
    }

    /// Load from a YAML document, preserving the declaration order of each
    /// list (`serde_yaml::Value` rather than a typed struct, for the same
    /// reason the task-pattern loader avoids `BTreeMap`: order is meaningful
    /// for "first recommended id" tie-breaking).
    pub fn from_yaml_str(content: &str) -> RouterResult<Self> {
        let doc: serde_yaml::Value = serde_yaml::from_str(content)?;
        let mapping = doc.as_mapping().ok_or_else(|| ConfigError::InvalidFormat {
            file: "<guide>".to_string(),
            reason: "top level must be a mapping of task_type -> entry".to_string(),
        })?;

        let mut entries = HashMap::new();
        for (key, value) in mapping {
            let task_key = key.as_str().ok_or_else(|| ConfigError::InvalidFormat {
                file: "<guide>".to_string(),
                reason: "task type key must be a string".to_string(),
            })?;
            let task_type: TaskType = task_key.parse().map_err(|_| ConfigError::InvalidValue {
                field: "task_type".to_string(),
                value: task_key.to_string(),
                reason: "not a recognized task type".to_string(),
            })?;
            let value = value.as_mapping().ok_or_else(|| ConfigError::InvalidFormat {
                file: "<guide>".to_string(),
                reason: format!("entry for '{task_key}' must be a mapping"),
            })?;

            let mut entry = GuideEntry::default();
            entry.recommended = read_string_list(value, "recommended")?;
            entry.blocked = read_string_list(value, "blocked")?;
            entry.fallback_chain = read_string_list(value, "fallback_chain")?;
            entries.insert(task_type, entry);
        }
        Ok(Guide { entries })
    }

    pub fn load_or_empty(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Guide::empty();
        }
        match std::fs::read_to_string(path) {
            Ok(content) => match Guide::from_yaml_str(&content) {
                Ok(guide) => guide,
                Err(e) => {
                    log::warn!("guide file '{}' is invalid, ignoring: {e}", path.display());
                    Guide::empty()
                }
            },
            Err(e) => {
                log::warn!("could not read guide file '{}': {e}", path.display());
                Guide::empty()
            }
        }
    }
}

fn read_string_list(
    mapping: &serde_yaml::Mapping,
    key: &str,
) -> RouterResult<Vec<String>> {
    let value = match mapping.get(key) {
        Some(v) => v,
        None => return Ok(Vec::new()),
    };
    let seq = value.as_sequence().ok_or_else(|| ConfigError::InvalidFormat {
        file: "<guide>".to_string(),
        reason: format!("'{key}' must be a list"),
    })?;
    seq.iter()
        .map(|item| {
            item.as_str().map(str::to_string).ok_or_else(|| {
                ConfigError::InvalidFormat {
                    file: "<guide>".to_string(),
                    reason: format!("'{key}' entries must be strings"),
                }
                .into()
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
code_generation:
  recommended: ["claude-4-5-sonnet", "gpt-4o"]
  blocked: ["legacy-model"]
  fallback_chain: ["gpt-4o", "claude-4-5-sonnet"]
debugging:
  recommended: ["claude-4-5-sonnet"]
"#;

    #[test]
    fn parses_recommended_blocked_and_fallback_chain() {
        let guide = Guide::from_yaml_str(YAML).unwrap();
        let entry = guide.entry(TaskType::CodeGeneration).unwrap();
        assert_eq!(entry.recommended, vec!["claude-4-5-sonnet", "gpt-4o"]);
        assert_eq!(entry.blocked, vec!["legacy-model"]);
        assert_eq!(entry.fallback_chain, vec!["gpt-4o", "claude-4-5-sonnet"]);
    }

    #[test]
    fn missing_lists_default_to_empty() {
        let guide = Guide::from_yaml_str(YAML).unwrap();
        let entry = guide.entry(TaskType::Debugging).unwrap();
        assert!(entry.blocked.is_empty());
        assert!(entry.fallback_chain.is_empty());
    }

    #[test]
    fn is_blocked_checks_the_right_task_type() {
        let guide = Guide::from_yaml_str(YAML).unwrap();
        assert!(guide.is_blocked(TaskType::CodeGeneration, "legacy-model"));
        assert!(!guide.is_blocked(TaskType::CodeGeneration, "gpt-4o"));
        assert!(!guide.is_blocked(TaskType::Debugging, "legacy-model"));
    }

    #[test]
    fn missing_task_type_has_no_entry() {
        let guide = Guide::from_yaml_str(YAML).unwrap();
        assert!(guide.entry(TaskType::Translation).is_none());
    }

    #[test]
    fn empty_guide_blocks_nothing() {
        let guide = Guide::empty();
        assert!(!guide.is_blocked(TaskType::General, "anything"));
    }

    #[test]
    fn load_or_empty_falls_back_on_missing_file() {
        let guide = Guide::load_or_empty("/nonexistent/guide.yaml");
        assert!(!guide.is_blocked(TaskType::General, "anything"));
    }
}
