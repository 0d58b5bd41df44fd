//! Client Pool (C7): lazily instantiates and caches one [`AnyProvider`] per
//! [`Provider`], and exposes an availability snapshot the scorer and
//! selector consult without ever touching a live client.

use router_core::auth::EngineAuth;
use router_core::error::{RouterError, RouterResult};
use router_core::types::Provider;
use router_providers::{AiProvider, AnyProvider};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell, RwLock};
use tokio::time::Instant;

/// One slot per provider; `OnceCell` gives single-flight construction for
/// free — concurrent `Get` calls on an empty slot all await the same
/// in-flight `connect()` future instead of racing to build duplicate clients.
/// Stored as `Arc<dyn AiProvider>` rather than `Arc<AnyProvider>` so a test
/// can pre-seed a slot with a mock client (§4.4's generic-code case).
type Slot = Arc<OnceCell<RouterResult<Arc<dyn AiProvider>>>>;

pub struct ClientPool {
    slots: Mutex<HashMap<Provider, Slot>>,
    shutdown: RwLock<bool>,
    /// Per-provider health-check memoization (§4.4, C7's 60s TTL). Keyed on
    /// `Provider` rather than a credential hash: a pool only ever holds one
    /// client per provider, so the provider identity already disambiguates
    /// which credentials are in play.
    health_cache: Mutex<HashMap<Provider, (Instant, bool)>>,
}

impl ClientPool {
    pub fn new() -> Self {
        ClientPool {
            slots: Mutex::new(HashMap::new()),
            shutdown: RwLock::new(false),
            health_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Pre-seed `provider`'s slot with an already-constructed client,
    /// bypassing `AnyProvider::connect`. Used by integration tests to swap
    /// a mock `AiProvider` in for a real network client; harmless to call
    /// in production, though nothing there has a reason to.
    pub async fn seed(&self, provider: Provider, client: Arc<dyn AiProvider>) {
        let slot: Slot = Arc::new(OnceCell::new());
        let _ = slot.set(Ok(client));
        self.slots.lock().await.insert(provider, slot);
    }

    /// Declared-credential check only; does not construct a client. This is
    /// the snapshot the scorer's hard filter and the orchestrator's
    /// candidate-filtering step both read.
    pub fn is_available(&self, provider: Provider) -> bool {
        EngineAuth::is_available(provider)
    }

    pub fn available_providers(&self) -> Vec<Provider> {
        Provider::all()
            .iter()
            .copied()
            .filter(|p| self.is_available(*p))
            .collect()
    }

    /// Get or lazily construct the client for `provider`. Fails fast with
    /// `ProviderUnavailable` if credentials are missing, without ever
    /// attempting to build a client (matching §4.5's "fails fast").
    pub async fn get(&self, provider: Provider) -> RouterResult<Arc<dyn AiProvider>> {
        if *self.shutdown.read().await {
            return Err(RouterError::ProviderUnavailable {
                provider: provider.to_string(),
                reason: "client pool has been shut down".to_string(),
            });
        }
        if !self.is_available(provider) {
            return Err(RouterError::ProviderUnavailable {
                provider: provider.to_string(),
                reason: "required credentials are not configured".to_string(),
            });
        }

        let slot = {
            let mut slots = self.slots.lock().await;
            slots
                .entry(provider)
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        let result = slot
            .get_or_init(|| async move {
                AnyProvider::connect(provider)
                    .await
                    .map(|c| Arc::new(c) as Arc<dyn AiProvider>)
            })
            .await;

        match result {
            Ok(client) => Ok(client.clone()),
            Err(e) => Err(RouterError::ProviderUnavailable {
                provider: provider.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// Close every constructed client and refuse further `get` calls.
    pub async fn shutdown(&self) -> RouterResult<()> {
        *self.shutdown.write().await = true;
        let slots = self.slots.lock().await;
        for slot in slots.values() {
            if let Some(Ok(client)) = slot.get() {
                client.close().await?;
            }
        }
        Ok(())
    }

    /// Health-check `provider`, reusing a cached result if it was probed
    /// within `ttl` (§4.4, C7). A fresh probe replaces the cache entry
    /// regardless of outcome, so a provider that recovers is noticed within
    /// one TTL window rather than staying marked unhealthy forever.
    pub async fn health_checked(&self, provider: Provider, ttl: Duration) -> bool {
        if !self.is_available(provider) {
            return false;
        }
        {
            let cache = self.health_cache.lock().await;
            if let Some((checked_at, healthy)) = cache.get(&provider) {
                if checked_at.elapsed() < ttl {
                    return *healthy;
                }
            }
        }
        let healthy = match self.get(provider).await {
            Ok(client) => client.health_check().await.unwrap_or(false),
            Err(_) => false,
        };
        self.health_cache.lock().await.insert(provider, (Instant::now(), healthy));
        healthy
    }
}

impl Default for ClientPool {
    fn default() -> Self {
        Self::new()
    }
}
