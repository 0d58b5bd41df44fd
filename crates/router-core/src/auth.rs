//! Credential resolution and request authentication for the 8 providers.
//!
//! Every credential is read from the environment (§6 of the design), never
//! from a config file, and is wrapped in [`SecureString`] so it never shows
//! up in a `Debug` or log line. `EngineAuth::resolve` is what the client pool
//! (C7) calls to build its availability snapshot and what each provider
//! client calls at `ValidateConfig` time.

use crate::error::{RouterError, RouterResult};
use crate::types::Provider;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use std::collections::HashMap;

/// Secure string that clears its backing memory on drop.
#[derive(Clone)]
pub struct SecureString {
    data: Vec<u8>,
}

impl SecureString {
    pub fn new(s: String) -> Self {
        Self { data: s.into_bytes() }
    }

    pub fn as_str(&self) -> &str {
        // constructed only from valid UTF-8 `String`s
        std::str::from_utf8(&self.data).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Drop for SecureString {
    fn drop(&mut self) {
        for byte in &mut self.data {
            *byte = 0;
        }
    }
}

impl std::fmt::Debug for SecureString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecureString([REDACTED] {} bytes)", self.len())
    }
}

impl std::fmt::Display for SecureString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

/// How a provider expects its credential presented on the wire.
#[derive(Clone)]
pub enum AuthType {
    Bearer,
    ApiKey { header: String },
}

/// Holds one resolved, validated credential and knows how to attach it to a
/// request's headers.
pub struct AuthManager {
    auth_type: AuthType,
    token: SecureString,
}

impl AuthManager {
    pub fn new(auth_type: AuthType, token: String) -> RouterResult<Self> {
        Self::validate_token(&token).map_err(|reason| RouterError::ProviderUnavailable {
            provider: "unknown".to_string(),
            reason,
        })?;
        Ok(AuthManager {
            auth_type,
            token: SecureString::new(token),
        })
    }

    fn validate_token(token: &str) -> Result<(), String> {
        if token.is_empty() {
            return Err("credential is empty".to_string());
        }
        if token.len() < 8 {
            return Err("credential too short (minimum 8 characters)".to_string());
        }
        if token.len() > 4096 {
            return Err("credential too long (maximum 4096 characters)".to_string());
        }
        if token.contains(' ') || token.contains('\n') || token.contains('\r') {
            return Err("credential contains whitespace".to_string());
        }
        Ok(())
    }

    pub fn add_auth_headers(&self, headers: &mut HeaderMap) -> RouterResult<()> {
        let invalid = |reason: String| RouterError::ProviderUnavailable {
            provider: "unknown".to_string(),
            reason,
        };
        match &self.auth_type {
            AuthType::Bearer => {
                let value = format!("Bearer {}", self.token.as_str());
                let header_value =
                    HeaderValue::from_str(&value).map_err(|e| invalid(e.to_string()))?;
                headers.insert(AUTHORIZATION, header_value);
            }
            AuthType::ApiKey { header } => {
                let header_value =
                    HeaderValue::from_str(self.token.as_str()).map_err(|e| invalid(e.to_string()))?;
                let header_name = reqwest::header::HeaderName::from_bytes(header.as_bytes())
                    .map_err(|e| invalid(e.to_string()))?;
                headers.insert(header_name, header_value);
            }
        }
        Ok(())
    }

    /// Build a tuned reqwest client with this credential pre-attached.
    pub fn authenticated_client(&self) -> RouterResult<reqwest::Client> {
        let mut headers = HeaderMap::new();
        self.add_auth_headers(&mut headers)?;
        reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(120))
            .connect_timeout(std::time::Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .tcp_keepalive(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| RouterError::ProviderUnavailable {
                provider: "unknown".to_string(),
                reason: format!("failed to build HTTP client: {e}"),
            })
    }
}

/// Everything a provider client needs to talk to its endpoint: the
/// credential plus any non-secret addressing info (base URL, region).
pub struct ResolvedCredentials {
    pub auth: Option<AuthManager>,
    pub extra: HashMap<String, String>,
}

/// Resolves and validates per-provider credentials from the environment.
pub struct EngineAuth;

impl EngineAuth {
    /// Names of the env vars a provider requires, used by the client pool's
    /// availability snapshot without constructing a full client.
    pub fn required_env_vars(provider: Provider) -> &'static [&'static str] {
        match provider {
            Provider::OpenAi => &["OPENAI_API_KEY"],
            Provider::Anthropic => &["ANTHROPIC_API_KEY"],
            Provider::Google => &["GOOGLE_API_KEY"],
            Provider::Xai => &["XAI_API_KEY"],
            Provider::Azure => &["AZURE_OPENAI_API_KEY", "AZURE_OPENAI_ENDPOINT"],
            Provider::Bedrock => &["AWS_ACCESS_KEY_ID", "AWS_SECRET_ACCESS_KEY", "AWS_REGION"],
            Provider::Dial => &["DIAL_API_KEY", "DIAL_ENDPOINT"],
            Provider::Local => &[],
        }
    }

    /// Whether every env var a provider needs is currently set, without
    /// validating their contents. Used for the pool's availability snapshot.
    pub fn is_available(provider: Provider) -> bool {
        Self::required_env_vars(provider)
            .iter()
            .all(|name| std::env::var(name).is_ok())
    }

    /// Resolve full credentials for a provider, failing with
    /// `ProviderUnavailable` if anything required is missing or invalid.
    pub fn resolve(provider: Provider) -> RouterResult<ResolvedCredentials> {
        let unavailable = |reason: String| RouterError::ProviderUnavailable {
            provider: provider.to_string(),
            reason,
        };
        let env = |name: &str| -> RouterResult<String> {
            std::env::var(name).map_err(|_| unavailable(format!("{name} is not set")))
        };

        match provider {
            Provider::OpenAi => {
                let token = env("OPENAI_API_KEY")?;
                let auth = AuthManager::new(AuthType::Bearer, token).map_err(|e| match e {
                    RouterError::ProviderUnavailable { reason, .. } => unavailable(reason),
                    other => other,
                })?;
                Ok(ResolvedCredentials {
                    auth: Some(auth),
                    extra: HashMap::new(),
                })
            }
            Provider::Anthropic => {
                let token = env("ANTHROPIC_API_KEY")?;
                let auth = AuthManager::new(
                    AuthType::ApiKey {
                        header: "x-api-key".to_string(),
                    },
                    token,
                )?;
                Ok(ResolvedCredentials {
                    auth: Some(auth),
                    extra: HashMap::new(),
                })
            }
            Provider::Google => {
                let token = env("GOOGLE_API_KEY")?;
                let auth = AuthManager::new(
                    AuthType::ApiKey {
                        header: "x-goog-api-key".to_string(),
                    },
                    token,
                )?;
                Ok(ResolvedCredentials {
                    auth: Some(auth),
                    extra: HashMap::new(),
                })
            }
            Provider::Xai => {
                let token = env("XAI_API_KEY")?;
                let auth = AuthManager::new(AuthType::Bearer, token)?;
                Ok(ResolvedCredentials {
                    auth: Some(auth),
                    extra: HashMap::new(),
                })
            }
            Provider::Azure => {
                let token = env("AZURE_OPENAI_API_KEY")?;
                let endpoint = env("AZURE_OPENAI_ENDPOINT")?;
                let auth = AuthManager::new(
                    AuthType::ApiKey {
                        header: "api-key".to_string(),
                    },
                    token,
                )?;
                let mut extra = HashMap::new();
                extra.insert("endpoint".to_string(), endpoint);
                Ok(ResolvedCredentials {
                    auth: Some(auth),
                    extra,
                })
            }
            Provider::Bedrock => {
                let access_key = env("AWS_ACCESS_KEY_ID")?;
                let secret_key = env("AWS_SECRET_ACCESS_KEY")?;
                let region = env("AWS_REGION")?;
                let mut extra = HashMap::new();
                extra.insert("access_key_id".to_string(), access_key);
                extra.insert("secret_access_key".to_string(), secret_key);
                extra.insert("region".to_string(), region);
                Ok(ResolvedCredentials { auth: None, extra })
            }
            Provider::Dial => {
                let token = env("DIAL_API_KEY")?;
                let endpoint = env("DIAL_ENDPOINT")?;
                let auth = AuthManager::new(AuthType::Bearer, token)?;
                let mut extra = HashMap::new();
                extra.insert("endpoint".to_string(), endpoint);
                Ok(ResolvedCredentials {
                    auth: Some(auth),
                    extra,
                })
            }
            Provider::Local => {
                let mut extra = HashMap::new();
                extra.insert(
                    "host".to_string(),
                    std::env::var("OLLAMA_HOST").unwrap_or_else(|_| "http://localhost:11434".to_string()),
                );
                Ok(ResolvedCredentials { auth: None, extra })
            }
        }
    }
}
