//! Crate-level integration scenarios: full `Orchestrator::route` runs
//! against mock `AiProvider` clients seeded directly into the client pool,
//! rather than against real network providers.

use async_trait::async_trait;
use router_core::config::RuntimeConfig;
use router_core::error::{RouterError, RouterResult};
use router_core::model_registry::ModelRegistry;
use router_core::price_table::{ModelPrice, PriceTable};
use router_core::types::{
    ApiRequest, ApiResponse, Capability, CostTier, FinishReason, ModelDescriptor, ModelScores,
    Provider, RouteRequest, RunStatus, ToolCall, ToolDefinition, Usage,
};
use router_orchestrator::analyzer::TaskAnalyzer;
use router_orchestrator::guide::Guide;
use router_orchestrator::tool::ToolHandler;
use router_orchestrator::Orchestrator;
use router_providers::AiProvider;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::Mutex;

// `std::env::set_var` mutates process-global state; every test that touches
// provider-availability env vars serializes through this lock, the same
// pattern `router-core`'s auth tests use.
static ENV_LOCK: StdMutex<()> = StdMutex::new(());

/// Scripted `AiProvider`: pops one scripted result per `chat_completion`
/// call, optionally sleeping first to simulate a stuck provider (S6).
struct MockProvider {
    provider: Provider,
    responses: Mutex<VecDeque<RouterResult<ApiResponse>>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    closed: AtomicBool,
}

impl MockProvider {
    fn new(provider: Provider, responses: Vec<RouterResult<ApiResponse>>) -> Arc<Self> {
        Arc::new(MockProvider {
            provider,
            responses: Mutex::new(responses.into_iter().collect()),
            delay: None,
            calls: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        })
    }

    fn with_delay(provider: Provider, delay: Duration, responses: Vec<RouterResult<ApiResponse>>) -> Arc<Self> {
        Arc::new(MockProvider {
            provider,
            responses: Mutex::new(responses.into_iter().collect()),
            delay: Some(delay),
            calls: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl router_providers::AiProvider for MockProvider {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn health_check(&self) -> RouterResult<bool> {
        Ok(true)
    }

    async fn chat_completion(&self, _request: &ApiRequest) -> RouterResult<ApiResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let mut queue = self.responses.lock().await;
        queue.pop_front().unwrap_or_else(|| Ok(stop_response(Usage::default())))
    }

    async fn close(&self) -> RouterResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

struct Echo;

#[async_trait]
impl ToolHandler for Echo {
    async fn call(&self, arguments_json: &str) -> RouterResult<String> {
        Ok(arguments_json.to_string())
    }
}

fn descriptor(id: &str, provider: Provider, capabilities: &[Capability]) -> ModelDescriptor {
    ModelDescriptor {
        id: id.to_string(),
        api_name: id.to_string(),
        provider,
        context_window: 128_000,
        capabilities: capabilities.iter().copied().collect::<HashSet<_>>(),
        scores: ModelScores {
            reasoning: 80,
            coding: 80,
            speed: 80,
            quality: 80,
        },
        cost_tier: CostTier::Standard,
        aliases: HashSet::new(),
    }
}

fn stop_response(usage: Usage) -> ApiResponse {
    ApiResponse {
        content: Some("done".to_string()),
        tool_call: None,
        usage,
        model_api_name: "m".to_string(),
        finish_reason: FinishReason::Stop,
        raw: None,
    }
}

fn tool_call_response(usage: Usage, name: &str) -> ApiResponse {
    ApiResponse {
        content: None,
        tool_call: Some(ToolCall {
            id: "call-1".to_string(),
            name: name.to_string(),
            arguments_json: "{}".to_string(),
        }),
        usage,
        model_api_name: "m".to_string(),
        finish_reason: FinishReason::ToolCall,
        raw: None,
    }
}

fn orchestrator(descriptors: Vec<ModelDescriptor>, prices: Vec<(Provider, &str, ModelPrice)>) -> Orchestrator {
    let registry = ModelRegistry::from_descriptors(descriptors).unwrap();
    let mut price_table = PriceTable::new();
    for (provider, api_name, price) in prices {
        price_table.insert(provider, api_name, price);
    }
    let analyzer = TaskAnalyzer::fallback(16);
    let guide = Guide::empty();
    Orchestrator::new(RuntimeConfig::default(), registry, price_table, analyzer, guide)
}

fn request(prompt: &str) -> RouteRequest {
    RouteRequest {
        prompt: prompt.to_string(),
        ..Default::default()
    }
}

const PRICE: ModelPrice = ModelPrice {
    input_per_1k: 0.01,
    output_per_1k: 0.02,
};

/// S1: a single healthy candidate produces a successful response and a
/// correctly priced `CostEvent` at fallback depth 0.
#[tokio::test]
async fn s1_simple_routing_produces_a_cost_event() {
    let orch = orchestrator(
        vec![descriptor("solo", Provider::Local, &[Capability::Coding])],
        vec![(Provider::Local, "solo", PRICE)],
    );
    let mock = MockProvider::new(Provider::Local, vec![Ok(stop_response(Usage::new(100, 50)))]);
    orch.seed_client(Provider::Local, mock.clone()).await;

    let result = orch.route(request("write a function to add two numbers")).await.unwrap();
    assert_eq!(result.fallback_depth, 0);
    assert_eq!(result.response.finish_reason, FinishReason::Stop);
    assert_eq!(result.cost_event.prompt_tokens, 100);
    assert_eq!(result.cost_event.completion_tokens, 50);
    assert_eq!(result.cost_event.status, RunStatus::Success);
    assert!((result.cost_event.cost_usd_total - 0.002).abs() < 1e-9);
    assert_eq!(mock.call_count(), 1);
}

/// S2: the primary candidate is unavailable; the fallback manager moves to
/// the next candidate and the run succeeds with two attempt records worth
/// of provider calls (one per candidate).
#[tokio::test]
async fn s2_fallback_on_provider_failure_moves_to_next_candidate() {
    let _guard = ENV_LOCK.lock().unwrap();
    std::env::set_var("OPENAI_API_KEY", "sk-test-1234567890");

    let orch = orchestrator(
        vec![
            descriptor("primary", Provider::Local, &[Capability::Coding]),
            descriptor("secondary", Provider::OpenAi, &[Capability::Coding]),
        ],
        vec![
            (Provider::Local, "primary", PRICE),
            (Provider::OpenAi, "secondary", PRICE),
        ],
    );
    let primary_mock = MockProvider::new(
        Provider::Local,
        vec![Err(RouterError::ProviderUnavailable {
            provider: "local".to_string(),
            reason: "simulated outage".to_string(),
        })],
    );
    let secondary_mock = MockProvider::new(Provider::OpenAi, vec![Ok(stop_response(Usage::new(20, 10)))]);
    orch.seed_client(Provider::Local, primary_mock.clone()).await;
    orch.seed_client(Provider::OpenAi, secondary_mock.clone()).await;

    let result = orch.route(request("write a function to add two numbers")).await.unwrap();
    assert_eq!(result.fallback_depth, 1);
    assert_eq!(result.cost_event.status, RunStatus::FallbackUsed);
    assert_eq!(primary_mock.call_count(), 1);
    assert_eq!(secondary_mock.call_count(), 1);

    std::env::remove_var("OPENAI_API_KEY");
}

/// S3: a tool-call round trip aggregates usage across both provider calls
/// into one final response.
#[tokio::test]
async fn s3_tool_call_loop_aggregates_usage_across_iterations() {
    let orch = orchestrator(
        vec![descriptor("solo", Provider::Local, &[Capability::FunctionCalling])],
        vec![(Provider::Local, "solo", PRICE)],
    );
    let mock = MockProvider::new(
        Provider::Local,
        vec![
            Ok(tool_call_response(Usage::new(100, 20), "echo")),
            Ok(stop_response(Usage::new(30, 10))),
        ],
    );
    orch.seed_client(Provider::Local, mock.clone()).await;
    orch.register_tool("echo", Arc::new(Echo)).await;

    let mut req = request("implement a function that calls a tool");
    req.tools = vec![ToolDefinition {
        name: "echo".to_string(),
        description: "echoes its input".to_string(),
        parameters: serde_json::json!({"type": "object"}),
    }];

    let result = orch.route(req).await.unwrap();
    assert_eq!(result.response.finish_reason, FinishReason::Stop);
    assert_eq!(result.cost_event.prompt_tokens, 130);
    assert_eq!(result.cost_event.completion_tokens, 30);
    assert_eq!(mock.call_count(), 2);
}

/// S4: a billing-integrity violation on the primary candidate is terminal —
/// the fallback manager never tries the next candidate.
#[tokio::test]
async fn s4_billing_integrity_violation_aborts_the_whole_chain() {
    let _guard = ENV_LOCK.lock().unwrap();
    std::env::set_var("OPENAI_API_KEY", "sk-test-1234567890");

    let orch = orchestrator(
        vec![
            descriptor("primary", Provider::Local, &[Capability::Coding]),
            descriptor("secondary", Provider::OpenAi, &[Capability::Coding]),
        ],
        vec![
            (Provider::Local, "primary", PRICE),
            (Provider::OpenAi, "secondary", PRICE),
        ],
    );
    let inconsistent = ApiResponse {
        content: Some("oops".to_string()),
        tool_call: None,
        usage: Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 999,
        },
        model_api_name: "primary".to_string(),
        finish_reason: FinishReason::Stop,
        raw: None,
    };
    let primary_mock = MockProvider::new(Provider::Local, vec![Ok(inconsistent)]);
    let secondary_mock = MockProvider::new(Provider::OpenAi, vec![Ok(stop_response(Usage::new(20, 10)))]);
    orch.seed_client(Provider::Local, primary_mock.clone()).await;
    orch.seed_client(Provider::OpenAi, secondary_mock.clone()).await;

    let err = orch.route(request("write a function to add two numbers")).await.unwrap_err();
    assert!(matches!(err, RouterError::BillingIntegrity { .. }));
    assert_eq!(primary_mock.call_count(), 1);
    assert_eq!(secondary_mock.call_count(), 0);

    std::env::remove_var("OPENAI_API_KEY");
}

/// S5: a vision requirement with no vision-capable model in the registry
/// fails selection outright, before any provider is ever contacted.
#[tokio::test]
async fn s5_unmet_vision_requirement_yields_no_candidate() {
    let orch = orchestrator(
        vec![descriptor("text-only", Provider::Local, &[Capability::Coding])],
        vec![(Provider::Local, "text-only", PRICE)],
    );
    let mock = MockProvider::new(Provider::Local, vec![Ok(stop_response(Usage::new(1, 1)))]);
    orch.seed_client(Provider::Local, mock.clone()).await;

    let err = orch.route(request("describe this image for me")).await.unwrap_err();
    assert!(matches!(err, RouterError::NoCandidate { .. }));
    assert_eq!(mock.call_count(), 0);
}

/// S6: a provider call that outlives the request deadline is cancelled
/// within the remaining budget, and the stuck client is closed.
#[tokio::test(start_paused = true)]
async fn s6_stuck_provider_is_cancelled_at_deadline_and_closed() {
    let orch = orchestrator(
        vec![descriptor("slow", Provider::Local, &[Capability::Coding])],
        vec![(Provider::Local, "slow", PRICE)],
    );
    let mock = MockProvider::with_delay(
        Provider::Local,
        Duration::from_millis(500),
        vec![Ok(stop_response(Usage::new(1, 1)))],
    );
    orch.seed_client(Provider::Local, mock.clone()).await;

    let mut req = request("write a function to add two numbers");
    req.deadline = Some(Duration::from_millis(200));

    let started = tokio::time::Instant::now();
    let err = orch.route(req).await.unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(err, RouterError::Cancelled { .. }));
    assert!(elapsed <= Duration::from_millis(300));
    assert!(mock.closed.load(Ordering::SeqCst));
}
