//! C2: provider/model -> ($ per 1K input tokens, $ per 1K output tokens).

use crate::error::{ConfigError, RouterResult};
use crate::types::Provider;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Price for one model: dollars per 1000 tokens, input and output separately.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ModelPrice {
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

impl ModelPrice {
    pub const FREE: ModelPrice = ModelPrice {
        input_per_1k: 0.0,
        output_per_1k: 0.0,
    };
}

#[derive(Debug, Deserialize)]
struct PriceTableFile(HashMap<String, HashMap<String, ModelPrice>>);

/// Immutable provider -> model -> price lookup table.
#[derive(Debug, Clone, Default)]
pub struct PriceTable {
    prices: HashMap<(Provider, String), ModelPrice>,
}

impl PriceTable {
    pub fn new() -> Self {
        PriceTable {
            prices: HashMap::new(),
        }
    }

    pub fn insert(&mut self, provider: Provider, model_api_name: impl Into<String>, price: ModelPrice) {
        self.prices.insert((provider, model_api_name.into()), price);
    }

    pub fn get(&self, provider: Provider, model_api_name: &str) -> Option<ModelPrice> {
        self.prices.get(&(provider, model_api_name.to_string())).copied()
    }

    /// Look up a price, falling back to `ModelPrice::FREE` only when the
    /// caller has already established the model is a `free` cost tier;
    /// otherwise a missing entry is a `CostError`, surfaced by the cost tracker.
    pub fn require(&self, provider: Provider, model_api_name: &str) -> RouterResult<ModelPrice> {
        self.get(provider, model_api_name).ok_or_else(|| {
            crate::error::CostError::PricingModelNotFound {
                provider: provider.to_string(),
                model: model_api_name.to_string(),
            }
            .into()
        })
    }

    pub fn load(path: impl AsRef<Path>) -> RouterResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound(path.display().to_string()))?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> RouterResult<Self> {
        let file: PriceTableFile = serde_yaml::from_str(content)?;
        let mut table = PriceTable::new();
        for (provider_str, models) in file.0 {
            let provider: Provider = provider_str.parse().map_err(|_| {
                ConfigError::InvalidValue {
                    field: "price_table".to_string(),
                    value: provider_str.clone(),
                    reason: "unknown provider".to_string(),
                }
            })?;
            for (model, price) in models {
                table.insert(provider, model, price);
            }
        }
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_entry_is_cost_error() {
        let table = PriceTable::new();
        let err = table.require(Provider::OpenAi, "gpt-4o").unwrap_err();
        assert!(matches!(err, crate::error::RouterError::Cost(_)));
    }

    #[test]
    fn parses_from_yaml() {
        let yaml = r#"
openai:
  gpt-4o-2024-08-06:
    input_per_1k: 0.0025
    output_per_1k: 0.01
anthropic:
  claude-3-5-sonnet-20241022:
    input_per_1k: 0.003
    output_per_1k: 0.015
"#;
        let table = PriceTable::from_yaml_str(yaml).unwrap();
        assert_eq!(table.len(), 2);
        let p = table.require(Provider::OpenAi, "gpt-4o-2024-08-06").unwrap();
        assert!((p.input_per_1k - 0.0025).abs() < f64::EPSILON);
    }
}
