//! Layered runtime configuration: compiled-in defaults, overridden by a YAML
//! file, overridden by individual environment variables — in that
//! precedence order, matching how the rest of this codebase's lineage layers
//! config over engine definitions.

use crate::cost_calculator::CostLimits;
use crate::error::{ConfigError, RouterResult};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Weights used by the model scorer's four sub-scores (§4.2 of the design).
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ScorerWeights {
    pub context: f64,
    pub speed: f64,
    pub cost: f64,
    pub capability: f64,
}

impl Default for ScorerWeights {
    fn default() -> Self {
        ScorerWeights {
            context: 0.20,
            speed: 0.15,
            cost: 0.15,
            capability: 0.50,
        }
    }
}

/// Tunable knobs for the whole request pipeline.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub analyzer_cache_size: usize,
    pub max_function_calls: u32,
    pub tool_timeout: Duration,
    pub max_fallbacks: usize,
    pub health_cache_ttl: Duration,
    pub shutdown_grace: Duration,
    pub scorer_weights: ScorerWeights,
    pub cost_limits: CostLimits,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            analyzer_cache_size: 1024,
            max_function_calls: 10,
            tool_timeout: Duration::from_secs(30),
            max_fallbacks: 5,
            health_cache_ttl: Duration::from_secs(60),
            shutdown_grace: Duration::from_secs(5),
            scorer_weights: ScorerWeights::default(),
            cost_limits: CostLimits::default(),
        }
    }
}

/// Shape of the optional YAML runtime-config file; every field is optional
/// so a partial file only overrides what it names, leaving the rest default.
#[derive(Debug, Default, Deserialize)]
struct RuntimeConfigFile {
    analyzer_cache_size: Option<usize>,
    max_function_calls: Option<u32>,
    tool_timeout_seconds: Option<u64>,
    max_fallbacks: Option<usize>,
    health_cache_ttl_seconds: Option<u64>,
    shutdown_grace_seconds: Option<u64>,
    scorer_weights: Option<ScorerWeights>,
    max_single_request_cost: Option<f64>,
    max_daily_total_cost: Option<f64>,
    warn_threshold_cost: Option<f64>,
}

impl RuntimeConfig {
    /// Load defaults, then a YAML file if `path` is `Some` and exists, then
    /// environment variable overrides. Matches the three-tier precedence
    /// documented in the external-interfaces section of the design.
    pub fn load(path: Option<impl AsRef<Path>>) -> RouterResult<Self> {
        let mut config = RuntimeConfig::default();

        if let Some(path) = path {
            let path = path.as_ref();
            if path.exists() {
                let content = std::fs::read_to_string(path)
                    .map_err(|_| ConfigError::FileNotFound(path.display().to_string()))?;
                let file: RuntimeConfigFile = serde_yaml::from_str(&content)?;
                config.apply_file(file);
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_file(&mut self, file: RuntimeConfigFile) {
        if let Some(v) = file.analyzer_cache_size {
            self.analyzer_cache_size = v;
        }
        if let Some(v) = file.max_function_calls {
            self.max_function_calls = v;
        }
        if let Some(v) = file.tool_timeout_seconds {
            self.tool_timeout = Duration::from_secs(v);
        }
        if let Some(v) = file.max_fallbacks {
            self.max_fallbacks = v;
        }
        if let Some(v) = file.health_cache_ttl_seconds {
            self.health_cache_ttl = Duration::from_secs(v);
        }
        if let Some(v) = file.shutdown_grace_seconds {
            self.shutdown_grace = Duration::from_secs(v);
        }
        if let Some(w) = file.scorer_weights {
            self.scorer_weights = w;
        }
        if let Some(v) = file.max_single_request_cost {
            self.cost_limits.max_single_request = v;
        }
        if let Some(v) = file.max_daily_total_cost {
            self.cost_limits.max_daily_total = v;
        }
        if let Some(v) = file.warn_threshold_cost {
            self.cost_limits.warn_threshold = v;
        }
    }

    fn apply_env_overrides(&mut self) -> RouterResult<()> {
        if let Some(v) = env_usize("ROUTER_ANALYZER_CACHE_SIZE")? {
            self.analyzer_cache_size = v;
        }
        if let Some(v) = env_u32("ROUTER_MAX_FUNCTION_CALLS")? {
            self.max_function_calls = v;
        }
        if let Some(v) = env_u64("ROUTER_TOOL_TIMEOUT_SECONDS")? {
            self.tool_timeout = Duration::from_secs(v);
        }
        if let Some(v) = env_usize("ROUTER_MAX_FALLBACKS")? {
            self.max_fallbacks = v;
        }
        if let Some(v) = env_u64("ROUTER_HEALTH_CACHE_TTL_SECONDS")? {
            self.health_cache_ttl = Duration::from_secs(v);
        }
        if let Some(v) = env_u64("ROUTER_SHUTDOWN_GRACE_SECONDS")? {
            self.shutdown_grace = Duration::from_secs(v);
        }
        Ok(())
    }

    fn validate(&self) -> RouterResult<()> {
        if self.analyzer_cache_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "analyzer_cache_size".to_string(),
                value: "0".to_string(),
                reason: "must be >= 1".to_string(),
            }
            .into());
        }
        if self.max_function_calls == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_function_calls".to_string(),
                value: "0".to_string(),
                reason: "must be >= 1".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

fn env_usize(name: &str) -> RouterResult<Option<usize>> {
    env_parsed(name)
}

fn env_u32(name: &str) -> RouterResult<Option<u32>> {
    env_parsed(name)
}

fn env_u64(name: &str) -> RouterResult<Option<u64>> {
    env_parsed(name)
}

fn env_parsed<T: std::str::FromStr>(name: &str) -> RouterResult<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw.parse::<T>().map(Some).map_err(|_| {
            ConfigError::InvalidValue {
                field: name.to_string(),
                value: raw,
                reason: "not a valid number".to_string(),
            }
            .into()
        }),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => Err(ConfigError::InvalidValue {
            field: name.to_string(),
            value: "<non-unicode>".to_string(),
            reason: "environment variable is not valid unicode".to_string(),
        }
        .into()),
    }
}
