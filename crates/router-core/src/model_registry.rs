//! C1: in-memory catalog of model descriptors, loaded once from a YAML table.
//!
//! The registry is immutable after load: descriptors are handed out as shared
//! references, and the only way to change the catalog is `ModelRegistry::load`
//! producing a brand-new instance which the embedding application swaps in.

use crate::error::{ConfigError, RouterResult};
use crate::types::ModelDescriptor;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, serde::Deserialize)]
struct RegistryFile {
    models: Vec<ModelDescriptor>,
}

/// Immutable catalog of registered models, keyed by id with alias resolution.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    by_id: HashMap<String, ModelDescriptor>,
    alias_to_id: HashMap<String, String>,
}

impl ModelRegistry {
    /// Build a registry from already-validated descriptors (used by tests and
    /// by `load` once it has parsed the YAML).
    pub fn from_descriptors(descriptors: Vec<ModelDescriptor>) -> RouterResult<Self> {
        let mut by_id = HashMap::with_capacity(descriptors.len());
        let mut alias_to_id = HashMap::new();

        for d in descriptors {
            if d.context_window == 0 {
                return Err(ConfigError::InvalidValue {
                    field: format!("models[{}].context_window", d.id),
                    value: "0".to_string(),
                    reason: "context_window must be > 0".to_string(),
                }
                .into());
            }
            if by_id.contains_key(&d.id) {
                return Err(ConfigError::InvalidValue {
                    field: "models[].id".to_string(),
                    value: d.id.clone(),
                    reason: "duplicate model id".to_string(),
                }
                .into());
            }
            for alias in &d.aliases {
                alias_to_id.insert(alias.clone(), d.id.clone());
            }
            by_id.insert(d.id.clone(), d);
        }

        Ok(ModelRegistry { by_id, alias_to_id })
    }

    /// Load and parse a model registry YAML file from disk.
    pub fn load(path: impl AsRef<Path>) -> RouterResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|_| {
            ConfigError::FileNotFound(path.display().to_string())
        })?;
        Self::from_yaml_str(&content)
    }

    /// Parse a model registry from a YAML string (used by `load` and by tests
    /// that want to avoid touching the filesystem).
    pub fn from_yaml_str(content: &str) -> RouterResult<Self> {
        let file: RegistryFile = serde_yaml::from_str(content)?;
        Self::from_descriptors(file.models)
    }

    /// Resolve an id or alias to its descriptor.
    pub fn get(&self, id_or_alias: &str) -> Option<&ModelDescriptor> {
        self.by_id.get(id_or_alias).or_else(|| {
            self.alias_to_id
                .get(id_or_alias)
                .and_then(|id| self.by_id.get(id))
        })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModelDescriptor> {
        self.by_id.values()
    }

    pub fn list(&self) -> Vec<ModelDescriptor> {
        self.by_id.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
