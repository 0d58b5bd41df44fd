//! Orchestrator (C11): the top-level `Route` pipeline wiring together the
//! analyzer, selector, client pool, executor, fallback manager and cost
//! tracker per the pseudocode in the design's component table.

use crate::analyzer::TaskAnalyzer;
use crate::cost_tracker::CostTracker;
use crate::executor::{self, ExecutorConfig};
use crate::fallback;
use crate::guide::Guide;
use crate::pool::ClientPool;
use crate::selector::ModelSelector;
use crate::tool::{ToolHandler, ToolRegistry};
use router_core::config::RuntimeConfig;
use router_core::error::{RouterError, RouterResult};
use router_core::model_registry::ModelRegistry;
use router_core::price_table::PriceTable;
use router_core::types::{Message, Provider, RouteRequest, RouteResponse, RunStatus};
use router_providers::AiProvider;
use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::Instant;
use uuid::Uuid;

pub struct Orchestrator {
    config: RuntimeConfig,
    registry: ModelRegistry,
    guide: Guide,
    analyzer: TaskAnalyzer,
    pool: ClientPool,
    tools: RwLock<ToolRegistry>,
    cost_tracker: CostTracker,
}

impl Orchestrator {
    pub fn new(
        config: RuntimeConfig,
        registry: ModelRegistry,
        price_table: PriceTable,
        analyzer: TaskAnalyzer,
        guide: Guide,
    ) -> Self {
        let cost_tracker = CostTracker::new(price_table, config.cost_limits);
        Orchestrator {
            config,
            registry,
            guide,
            analyzer,
            pool: ClientPool::new(),
            tools: RwLock::new(ToolRegistry::new()),
            cost_tracker,
        }
    }

    /// `Orchestrator.RegisterTool(name, handler)`.
    pub async fn register_tool(&self, name: impl Into<String>, handler: Arc<dyn ToolHandler>) {
        self.tools.write().await.register(name, handler);
    }

    /// `Orchestrator.ListModels() → []ModelDescriptor`.
    pub fn list_models(&self) -> Vec<router_core::types::ModelDescriptor> {
        self.registry.list()
    }

    /// `Orchestrator.Health() → map<provider, bool>`. Each provider's result
    /// is served from the client pool's `health_cache_ttl`-second cache
    /// (§4.4, C7) rather than a fresh network probe on every call.
    pub async fn health(&self) -> HashMap<Provider, bool> {
        let mut out = HashMap::new();
        for provider in Provider::all() {
            let healthy = self.pool.health_checked(*provider, self.config.health_cache_ttl).await;
            out.insert(*provider, healthy);
        }
        out
    }

    /// Pre-seed `provider`'s client pool slot, bypassing real network
    /// construction. Exposed so integration tests can route through a mock
    /// `AiProvider` without touching live credentials.
    pub async fn seed_client(&self, provider: Provider, client: Arc<dyn AiProvider>) {
        self.pool.seed(provider, client).await;
    }

    /// `Orchestrator.Shutdown(grace)`.
    pub async fn shutdown(&self, grace: std::time::Duration) -> RouterResult<()> {
        match tokio::time::timeout(grace, self.pool.shutdown()).await {
            Ok(result) => result,
            Err(_) => Err(RouterError::Cancelled {
                after_ms: grace.as_millis() as u64,
            }),
        }
    }

    /// `Orchestrator.Route(request) → (response, cost_event, error)`.
    pub async fn route(&self, request: RouteRequest) -> RouterResult<RouteResponse> {
        let trace_id = request
            .trace_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut reqs = self.analyzer.analyze(&request.prompt);
        if let Some(hint) = request.task_hint {
            reqs.task_type = hint;
        }
        if let Some(priority) = request.priority {
            reqs.priority = priority;
        }

        let available = self.pool.available_providers();
        let selector = ModelSelector::new(
            &self.registry,
            &self.guide,
            self.config.scorer_weights,
            self.config.max_fallbacks,
        );
        let (primary, fallback_ids) = selector.select(&reqs, &HashSet::new(), Some(&available))?;

        let mut candidates = Vec::with_capacity(1 + fallback_ids.len());
        candidates.push(primary);
        candidates.extend(fallback_ids);

        if let Some(hint) = &request.model_hint {
            if self.registry.contains(hint) {
                candidates.retain(|id| id != hint);
                candidates.insert(0, hint.clone());
            }
        }

        candidates.retain(|id| {
            self.registry
                .get(id)
                .map(|m| available.contains(&m.provider))
                .unwrap_or(false)
        });

        if candidates.is_empty() {
            return Err(RouterError::NoCandidate {
                task_type: reqs.task_type.to_string(),
            });
        }

        let deadline = request.deadline.map(|d| Instant::now() + d);
        let messages = if request.messages.is_empty() {
            vec![Message::user(request.prompt.clone())]
        } else {
            request.messages.clone()
        };
        let tool_registry = self.tools.read().await.clone();
        let exec_config = ExecutorConfig {
            max_function_calls: self.config.max_function_calls,
            tool_timeout: self.config.tool_timeout,
        };

        let (result, _records) = fallback::run(&candidates, &trace_id, deadline, |candidate_id| {
            let model = self.registry.get(candidate_id).cloned();
            let messages = messages.clone();
            let tools = request.tools.clone();
            let trace_id = trace_id.clone();
            let tool_registry = &tool_registry;
            let exec_config = exec_config;
            async move {
                let model = model.ok_or_else(|| RouterError::NoCandidate {
                    task_type: "unknown".to_string(),
                })?;
                let client = self.pool.get(model.provider).await?;
                executor::execute(
                    client.as_ref(),
                    &model.api_name,
                    messages,
                    tools,
                    tool_registry,
                    deadline,
                    &trace_id,
                    &exec_config,
                )
                .await
            }
        })
        .await;

        let (depth, response) = result?;
        let chosen_id = &candidates[depth];
        let descriptor = self
            .registry
            .get(chosen_id)
            .expect("candidate ids always come from the registry");
        let status = if depth == 0 {
            RunStatus::Success
        } else {
            RunStatus::FallbackUsed
        };

        let cost_event = self.cost_tracker.record(
            &response,
            chosen_id,
            descriptor.provider,
            &descriptor.api_name,
            reqs.task_type,
            &trace_id,
            status,
            depth as u32,
            chrono::Utc::now(),
        )?;

        Ok(RouteResponse {
            response,
            cost_event,
            fallback_depth: depth as u32,
        })
    }
}
