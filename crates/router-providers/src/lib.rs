//! Provider clients (C6): one concrete type per wire protocol, behind a
//! small capability trait so the scheduler never depends on provider
//! internals beyond `{health_check, chat_completion, close}`.
//!
//! `ValidateConfig` from the design is not a trait method: it happens once,
//! at construction, inside each client's `new` — by the time an `AnyProvider`
//! exists, its config has already been validated, matching "called exactly
//! once at construction" in the component design.
//!
//! # Examples
//!
//! ```rust,no_run
//! use router_providers::{AnyProvider, AiProvider};
//! use router_core::types::Provider;
//!
//! # async fn example() -> router_core::error::RouterResult<()> {
//! let client = AnyProvider::connect(Provider::OpenAi).await?;
//! let healthy = client.health_check().await?;
//! # Ok(())
//! # }
//! ```

pub mod anthropic;
pub mod bedrock;
pub mod google;
pub mod openai_compat;

use async_trait::async_trait;
use router_core::error::RouterResult;
use router_core::types::{ApiRequest, ApiResponse, Provider};

/// Capability set every provider client implements (§4.4).
#[async_trait]
pub trait AiProvider: Send + Sync {
    fn provider(&self) -> Provider;

    /// Bounded, quota-free probe (e.g. `list_models`). Callers are expected
    /// to cache the result themselves (C7's 60s TTL); this trait method
    /// always performs a fresh probe.
    async fn health_check(&self) -> RouterResult<bool>;

    /// Issue one chat-completion call. Never fabricates `usage` — if the
    /// provider omits it, `usage` is all-zero and the executor's aggregator
    /// decides what that means (B3).
    async fn chat_completion(&self, request: &ApiRequest) -> RouterResult<ApiResponse>;

    /// Release any held connections. Idempotent.
    async fn close(&self) -> RouterResult<()>;
}

/// Tagged union over every concrete provider client, used by the client pool
/// so `Get(provider)` returns one static type rather than a trait object
/// when the caller wants to match on provider identity; anywhere generic
/// code is preferred, `Box<dyn AiProvider>` is used instead (both are valid
/// v-table/enum-dispatch encodings of the same capability set).
pub enum AnyProvider {
    OpenAiCompatible(openai_compat::OpenAiCompatibleClient),
    Anthropic(anthropic::AnthropicClient),
    Google(google::GoogleClient),
    Bedrock(bedrock::BedrockClient),
}

impl AnyProvider {
    /// Construct and validate-config the right client for `provider`,
    /// resolving credentials from the environment (§6).
    pub async fn connect(provider: Provider) -> RouterResult<Self> {
        use crate::openai_compat::WireProfile;
        match provider {
            Provider::OpenAi
            | Provider::Xai
            | Provider::Azure
            | Provider::Dial
            | Provider::Local => {
                let profile = WireProfile::for_provider(provider)?;
                Ok(AnyProvider::OpenAiCompatible(
                    openai_compat::OpenAiCompatibleClient::new(profile).await?,
                ))
            }
            Provider::Anthropic => Ok(AnyProvider::Anthropic(anthropic::AnthropicClient::new().await?)),
            Provider::Google => Ok(AnyProvider::Google(google::GoogleClient::new().await?)),
            Provider::Bedrock => Ok(AnyProvider::Bedrock(bedrock::BedrockClient::new().await?)),
        }
    }
}

#[async_trait]
impl AiProvider for AnyProvider {
    fn provider(&self) -> Provider {
        match self {
            AnyProvider::OpenAiCompatible(c) => c.provider(),
            AnyProvider::Anthropic(c) => c.provider(),
            AnyProvider::Google(c) => c.provider(),
            AnyProvider::Bedrock(c) => c.provider(),
        }
    }

    async fn health_check(&self) -> RouterResult<bool> {
        match self {
            AnyProvider::OpenAiCompatible(c) => c.health_check().await,
            AnyProvider::Anthropic(c) => c.health_check().await,
            AnyProvider::Google(c) => c.health_check().await,
            AnyProvider::Bedrock(c) => c.health_check().await,
        }
    }

    async fn chat_completion(&self, request: &ApiRequest) -> RouterResult<ApiResponse> {
        match self {
            AnyProvider::OpenAiCompatible(c) => c.chat_completion(request).await,
            AnyProvider::Anthropic(c) => c.chat_completion(request).await,
            AnyProvider::Google(c) => c.chat_completion(request).await,
            AnyProvider::Bedrock(c) => c.chat_completion(request).await,
        }
    }

    async fn close(&self) -> RouterResult<()> {
        match self {
            AnyProvider::OpenAiCompatible(c) => c.close().await,
            AnyProvider::Anthropic(c) => c.close().await,
            AnyProvider::Google(c) => c.close().await,
            AnyProvider::Bedrock(c) => c.close().await,
        }
    }
}
