use std::fmt;

/// Top-level error taxonomy for the router.
///
/// Every public, fallible function in `router-core`, `router-providers` and
/// `router-orchestrator` returns `Result<T, RouterError>`. Each variant
/// corresponds one-to-one to a row of the error-kind table in the
/// specification this crate implements; the fields carried are what a
/// caller needs to decide retry vs. surface, never a bare string.
#[derive(Debug)]
pub enum RouterError {
    /// Missing or structurally invalid credentials for a provider.
    ProviderUnavailable { provider: String, reason: String },

    /// 5xx, connection, or timeout failure from a provider; retryable.
    TransientProvider {
        provider: String,
        reason: String,
    },

    /// 429 with an optional retry-after hint.
    RateLimited {
        provider: String,
        retry_after: Option<u64>,
    },

    /// Provider rejected the request because the context window was exceeded.
    ContextTooLong {
        provider: String,
        model: String,
        limit: u32,
    },

    /// Provider moderation / content-policy rejection.
    ContentRejected { provider: String, reason: String },

    /// The caller-supplied tool handler failed.
    ToolExecution { tool_name: String, reason: String },

    /// The conversation executor hit `max_function_calls` without resolving.
    IterationLimit { iterations: u32 },

    /// A token-aggregation invariant (R1-R4) was violated. Fatal; never retried.
    BillingIntegrity { detail: String },

    /// The model selector produced an empty candidate chain.
    NoCandidate { task_type: String },

    /// The request's deadline elapsed, or the caller cancelled it.
    Cancelled { after_ms: u64 },

    /// A cost policy limit (not a correctness invariant) was exceeded.
    Cost(CostError),

    /// Configuration failed to load or validate.
    Config(ConfigError),
}

/// Cost-tracking specific failures. Kept distinct from the billing-integrity
/// kind in `RouterError` because a cost limit is a policy decision the
/// embedding application may choose to tolerate, not a correctness bug.
#[derive(Debug)]
pub enum CostError {
    PricingModelNotFound { provider: String, model: String },
    NegativeCost(f64),
    SingleRequestLimitExceeded { cost: f64, limit: f64 },
    DailyLimitExceeded { cost: f64, limit: f64 },
    InconsistentTotal { total: f64, computed: f64 },
}

/// Configuration-loading failures (pattern file, registry, price table, guide, runtime config).
#[derive(Debug)]
pub enum ConfigError {
    FileNotFound(String),
    InvalidFormat { file: String, reason: String },
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
    MissingEnvVar(String),
}

impl fmt::Display for RouterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouterError::ProviderUnavailable { provider, reason } => {
                write!(f, "provider '{provider}' unavailable: {reason}")
            }
            RouterError::TransientProvider { provider, reason } => {
                write!(f, "transient failure from provider '{provider}': {reason}")
            }
            RouterError::RateLimited {
                provider,
                retry_after,
            } => match retry_after {
                Some(s) => write!(f, "provider '{provider}' rate limited, retry after {s}s"),
                None => write!(f, "provider '{provider}' rate limited"),
            },
            RouterError::ContextTooLong {
                provider,
                model,
                limit,
            } => write!(
                f,
                "context window exceeded for model '{model}' on provider '{provider}' (limit {limit} tokens)"
            ),
            RouterError::ContentRejected { provider, reason } => {
                write!(f, "content rejected by provider '{provider}': {reason}")
            }
            RouterError::ToolExecution { tool_name, reason } => {
                write!(f, "tool '{tool_name}' failed: {reason}")
            }
            RouterError::IterationLimit { iterations } => {
                write!(f, "tool-call loop reached the iteration limit ({iterations})")
            }
            RouterError::BillingIntegrity { detail } => {
                write!(f, "billing-integrity invariant violated: {detail}")
            }
            RouterError::NoCandidate { task_type } => {
                write!(f, "no candidate model available for task type '{task_type}'")
            }
            RouterError::Cancelled { after_ms } => {
                write!(f, "request cancelled after {after_ms}ms")
            }
            RouterError::Cost(e) => write!(f, "cost error: {e}"),
            RouterError::Config(e) => write!(f, "configuration error: {e}"),
        }
    }
}

impl fmt::Display for CostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CostError::PricingModelNotFound { provider, model } => {
                write!(f, "no price table entry for provider '{provider}', model '{model}'")
            }
            CostError::NegativeCost(c) => write!(f, "negative cost computed: ${c:.8}"),
            CostError::SingleRequestLimitExceeded { cost, limit } => write!(
                f,
                "single-request cost ${cost:.6} exceeds limit ${limit:.2}"
            ),
            CostError::DailyLimitExceeded { cost, limit } => {
                write!(f, "daily cost ${cost:.6} exceeds limit ${limit:.2}")
            }
            CostError::InconsistentTotal { total, computed } => write!(
                f,
                "cost total ${total:.8} does not equal input+output (${computed:.8})"
            ),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "configuration file not found: {path}"),
            ConfigError::InvalidFormat { file, reason } => {
                write!(f, "invalid format in '{file}': {reason}")
            }
            ConfigError::InvalidValue {
                field,
                value,
                reason,
            } => write!(f, "invalid value '{value}' for '{field}': {reason}"),
            ConfigError::MissingEnvVar(name) => write!(f, "missing environment variable: {name}"),
        }
    }
}

impl std::error::Error for RouterError {}
impl std::error::Error for CostError {}
impl std::error::Error for ConfigError {}

/// Result alias used throughout the router crates.
pub type RouterResult<T> = Result<T, RouterError>;

impl From<CostError> for RouterError {
    fn from(err: CostError) -> Self {
        RouterError::Cost(err)
    }
}

impl From<ConfigError> for RouterError {
    fn from(err: ConfigError) -> Self {
        RouterError::Config(err)
    }
}

impl From<serde_yaml::Error> for RouterError {
    fn from(err: serde_yaml::Error) -> Self {
        RouterError::Config(ConfigError::InvalidFormat {
            file: "<yaml>".to_string(),
            reason: err.to_string(),
        })
    }
}

impl From<serde_json::Error> for RouterError {
    fn from(err: serde_json::Error) -> Self {
        RouterError::Config(ConfigError::InvalidFormat {
            file: "<json>".to_string(),
            reason: err.to_string(),
        })
    }
}

impl From<std::io::Error> for RouterError {
    fn from(err: std::io::Error) -> Self {
        RouterError::Config(ConfigError::FileNotFound(err.to_string()))
    }
}

/// Classifies a `reqwest::Error` into the taxonomy's provider-facing kinds.
/// Provider clients call this at the edge; it never sees raw credentials.
pub fn classify_reqwest_error(provider: &str, err: &reqwest::Error) -> RouterError {
    if err.is_timeout() {
        return RouterError::TransientProvider {
            provider: provider.to_string(),
            reason: "request timed out".to_string(),
        };
    }
    if err.is_connect() {
        return RouterError::TransientProvider {
            provider: provider.to_string(),
            reason: "connection failed".to_string(),
        };
    }
    if let Some(status) = err.status() {
        if status.as_u16() == 429 {
            return RouterError::RateLimited {
                provider: provider.to_string(),
                retry_after: None,
            };
        }
        if status.is_server_error() {
            return RouterError::TransientProvider {
                provider: provider.to_string(),
                reason: format!("server error {status}"),
            };
        }
    }
    RouterError::TransientProvider {
        provider: provider.to_string(),
        reason: err.to_string(),
    }
}

/// Whether an error kind should be retried on the same model, moved to the
/// next candidate, or is terminal for the whole fallback chain. Mirrors the
/// retry-classification table the Fallback Manager is built against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    RetrySameModel,
    RetryNextModel,
    Terminal,
}

impl RouterError {
    pub fn retry_class(&self) -> RetryClass {
        match self {
            RouterError::TransientProvider { .. } | RouterError::RateLimited { .. } => {
                RetryClass::RetrySameModel
            }
            RouterError::ProviderUnavailable { .. }
            | RouterError::ContextTooLong { .. }
            | RouterError::ContentRejected { .. } => RetryClass::RetryNextModel,
            RouterError::BillingIntegrity { .. }
            | RouterError::NoCandidate { .. }
            | RouterError::Cancelled { .. }
            | RouterError::ToolExecution { .. }
            | RouterError::IterationLimit { .. }
            | RouterError::Cost(_)
            | RouterError::Config(_) => RetryClass::Terminal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_classification_matches_taxonomy() {
        assert_eq!(
            RouterError::TransientProvider {
                provider: "openai".into(),
                reason: "boom".into()
            }
            .retry_class(),
            RetryClass::RetrySameModel
        );
        assert_eq!(
            RouterError::ProviderUnavailable {
                provider: "openai".into(),
                reason: "no key".into()
            }
            .retry_class(),
            RetryClass::RetryNextModel
        );
        assert_eq!(
            RouterError::BillingIntegrity {
                detail: "bad total".into()
            }
            .retry_class(),
            RetryClass::Terminal
        );
    }

    #[test]
    fn display_never_panics_and_omits_credentials() {
        let e = RouterError::ProviderUnavailable {
            provider: "anthropic".into(),
            reason: "ANTHROPIC_API_KEY not set".into(),
        };
        let s = e.to_string();
        assert!(s.contains("anthropic"));
    }
}
