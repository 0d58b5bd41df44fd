//! Conversation Executor (C8): drives the tool-call loop for one candidate
//! model and enforces the billing-integrity invariants (R1-R4) on every
//! iteration before a token is ever handed to the cost tracker.

use crate::tool::ToolRegistry;
use router_core::error::{RouterError, RouterResult};
use router_core::types::{ApiRequest, ApiResponse, FinishReason, Message, ToolCall, ToolDefinition, Usage};
use router_providers::AiProvider;
use tokio::time::Instant;
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
pub struct ExecutorConfig {
    pub max_function_calls: u32,
    pub tool_timeout: std::time::Duration,
}

fn check_deadline(deadline: Option<Instant>) -> RouterResult<()> {
    if let Some(deadline) = deadline {
        let now = Instant::now();
        if now >= deadline {
            return Err(RouterError::Cancelled { after_ms: 0 });
        }
    }
    Ok(())
}

/// Run the provider call, bounded by whatever remains of `deadline`. On
/// expiry the client is closed (S6: "client.Close called") before the
/// `Cancelled` error is returned, so a stuck provider doesn't outlive the
/// request that gave up on it.
async fn call_with_deadline(
    client: &dyn AiProvider,
    request: &ApiRequest,
    deadline: Option<Instant>,
    started: Instant,
) -> RouterResult<ApiResponse> {
    let Some(deadline) = deadline else {
        return client.chat_completion(request).await;
    };
    let remaining = deadline.saturating_duration_since(Instant::now());
    match tokio::time::timeout(remaining, client.chat_completion(request)).await {
        Ok(result) => result,
        Err(_) => {
            let _ = client.close().await;
            Err(RouterError::Cancelled {
                after_ms: started.elapsed().as_millis() as u64,
            })
        }
    }
}

/// Synthesize a fresh tool-call id when the provider doesn't echo one.
/// 96 bits: the first 24 hex characters of a v4 UUID.
fn synthesize_tool_call_id() -> String {
    Uuid::new_v4().simple().to_string()[..24].to_string()
}

/// Add one iteration's usage into the running aggregate, enforcing R1
/// (total = prompt + completion) and overflow-safety (R4's "no negative
/// deltas" reframed as "no wraparound" since these are unsigned counters).
fn aggregate_usage(aggregate: Usage, delta: Usage) -> RouterResult<Usage> {
    let next = aggregate.checked_add(delta).ok_or_else(|| RouterError::BillingIntegrity {
        detail: format!(
            "token aggregation overflowed: running total {}+{} plus delta {}+{}",
            aggregate.prompt_tokens, aggregate.completion_tokens,
            delta.prompt_tokens, delta.completion_tokens
        ),
    })?;
    if !next.is_consistent() {
        return Err(RouterError::BillingIntegrity {
            detail: format!(
                "aggregate total {} != prompt {} + completion {} after adding {:?}",
                next.total_tokens, next.prompt_tokens, next.completion_tokens, delta
            ),
        });
    }
    Ok(next)
}

/// `Execute(client, model_api_name, messages, tools, deadline, trace_id) → APIResponse`.
///
/// `deadline` is an absolute instant (already derived from the caller's
/// remaining budget by the Fallback Manager); `None` means no deadline.
pub async fn execute(
    client: &dyn AiProvider,
    model_api_name: &str,
    mut messages: Vec<Message>,
    tools: Vec<ToolDefinition>,
    tool_registry: &ToolRegistry,
    deadline: Option<Instant>,
    trace_id: &str,
    config: &ExecutorConfig,
) -> RouterResult<ApiResponse> {
    let mut aggregate = Usage::default();
    let mut last_response: Option<ApiResponse> = None;
    let mut resolved = false;
    let started = Instant::now();

    for _iteration in 0..config.max_function_calls {
        check_deadline(deadline)?;

        let request = ApiRequest {
            model_api_name: model_api_name.to_string(),
            messages: messages.clone(),
            tools: tools.clone(),
            temperature: None,
            max_tokens: None,
            trace_id: trace_id.to_string(),
        };

        let response = call_with_deadline(client, &request, deadline, started).await?;
        aggregate = aggregate_usage(aggregate, response.usage)?;

        if response.finish_reason != FinishReason::ToolCall {
            last_response = Some(response);
            resolved = true;
            break;
        }

        let tool_call = response.tool_call.clone().ok_or_else(|| RouterError::BillingIntegrity {
            detail: "finish_reason=tool_call but response carried no tool_call".to_string(),
        })?;
        let tool_call_id = if tool_call.id.is_empty() {
            synthesize_tool_call_id()
        } else {
            tool_call.id.clone()
        };

        messages.push(Message {
            role: "assistant".to_string(),
            content: response.content.clone(),
            tool_call_id: None,
            tool_calls: Some(vec![ToolCall {
                id: tool_call_id.clone(),
                name: tool_call.name.clone(),
                arguments_json: tool_call.arguments_json.clone(),
            }]),
        });

        let handler = tool_registry.get(&tool_call.name).ok_or_else(|| RouterError::ToolExecution {
            tool_name: tool_call.name.clone(),
            reason: "no handler registered for this tool".to_string(),
        })?;

        let tool_result = tokio::time::timeout(config.tool_timeout, handler.call(&tool_call.arguments_json))
            .await
            .map_err(|_| RouterError::ToolExecution {
                tool_name: tool_call.name.clone(),
                reason: format!("tool call exceeded {:?} timeout", config.tool_timeout),
            })??;

        messages.push(Message::tool_result(tool_call_id, tool_result));
        last_response = Some(response);
    }

    let mut response = last_response.ok_or_else(|| RouterError::IterationLimit {
        iterations: config.max_function_calls,
    })?;

    if !resolved {
        response.finish_reason = FinishReason::Length;
    }
    response.usage = aggregate;

    log::info!(
        "executor finished: trace_id={trace_id} model={model_api_name} iterations_used={} prompt_tokens={} completion_tokens={} finish_reason={:?}",
        config.max_function_calls,
        aggregate.prompt_tokens,
        aggregate.completion_tokens,
        response.finish_reason,
    );

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::ToolHandler;
    use async_trait::async_trait;
    use router_core::types::Provider;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::Mutex;

    struct ScriptedClient {
        responses: Mutex<Vec<ApiResponse>>,
        calls: AtomicUsize,
    }

    impl ScriptedClient {
        fn new(responses: Vec<ApiResponse>) -> Self {
            ScriptedClient {
                responses: Mutex::new(responses),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl AiProvider for ScriptedClient {
        fn provider(&self) -> Provider {
            Provider::OpenAi
        }

        async fn health_check(&self) -> RouterResult<bool> {
            Ok(true)
        }

        async fn chat_completion(&self, _request: &ApiRequest) -> RouterResult<ApiResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().await;
            if responses.is_empty() {
                panic!("scripted client ran out of responses");
            }
            Ok(responses.remove(0))
        }

        async fn close(&self) -> RouterResult<()> {
            Ok(())
        }
    }

    struct SleepyClient {
        delay: std::time::Duration,
        closed: Arc<std::sync::atomic::AtomicBool>,
    }

    #[async_trait]
    impl AiProvider for SleepyClient {
        fn provider(&self) -> Provider {
            Provider::OpenAi
        }

        async fn health_check(&self) -> RouterResult<bool> {
            Ok(true)
        }

        async fn chat_completion(&self, _request: &ApiRequest) -> RouterResult<ApiResponse> {
            tokio::time::sleep(self.delay).await;
            Ok(final_response(Usage::new(1, 1)))
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

    fn config() -> ExecutorConfig {
        ExecutorConfig {
            max_function_calls: 10,
            tool_timeout: std::time::Duration::from_secs(1),
        }
    }

    fn final_response(usage: Usage) -> ApiResponse {
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
                id: String::new(),
                name: name.to_string(),
                arguments_json: "{}".to_string(),
            }),
            usage,
            model_api_name: "m".to_string(),
            finish_reason: FinishReason::ToolCall,
            raw: None,
        }
    }

    #[tokio::test]
    async fn single_turn_completion_aggregates_usage() {
        let client = ScriptedClient::new(vec![final_response(Usage::new(100, 50))]);
        let registry = ToolRegistry::new();
        let response = execute(
            &client,
            "m",
            vec![Message::user("hi")],
            vec![],
            &registry,
            None,
            "trace-1",
            &config(),
        )
        .await
        .unwrap();
        assert_eq!(response.usage.prompt_tokens, 100);
        assert_eq!(response.usage.completion_tokens, 50);
        assert_eq!(response.usage.total_tokens, 150);
        assert_eq!(response.finish_reason, FinishReason::Stop);
    }

    #[tokio::test]
    async fn tool_call_loop_aggregates_across_iterations() {
        let client = ScriptedClient::new(vec![
            tool_call_response(Usage::new(100, 20), "echo"),
            final_response(Usage::new(130, 40)),
        ]);
        let mut registry = ToolRegistry::new();
        registry.register("echo", Arc::new(Echo));
        let response = execute(
            &client,
            "m",
            vec![Message::user("hi")],
            vec![],
            &registry,
            None,
            "trace-2",
            &config(),
        )
        .await
        .unwrap();
        assert_eq!(response.usage.prompt_tokens, 230);
        assert_eq!(response.usage.completion_tokens, 60);
        assert_eq!(response.usage.total_tokens, 290);
    }

    #[tokio::test]
    async fn unregistered_tool_surfaces_tool_execution_error() {
        let client = ScriptedClient::new(vec![tool_call_response(Usage::new(10, 5), "missing")]);
        let registry = ToolRegistry::new();
        let err = execute(
            &client,
            "m",
            vec![Message::user("hi")],
            vec![],
            &registry,
            None,
            "trace-3",
            &config(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RouterError::ToolExecution { .. }));
    }

    #[tokio::test]
    async fn hitting_iteration_cap_returns_length_with_aggregated_usage() {
        let mut responses = Vec::new();
        for _ in 0..3 {
            responses.push(tool_call_response(Usage::new(10, 5), "echo"));
        }
        let client = ScriptedClient::new(responses);
        let mut registry = ToolRegistry::new();
        registry.register("echo", Arc::new(Echo));
        let cfg = ExecutorConfig {
            max_function_calls: 3,
            tool_timeout: std::time::Duration::from_secs(1),
        };
        let response = execute(
            &client,
            "m",
            vec![Message::user("hi")],
            vec![],
            &registry,
            None,
            "trace-4",
            &cfg,
        )
        .await
        .unwrap();
        assert_eq!(response.finish_reason, FinishReason::Length);
        assert_eq!(response.usage.prompt_tokens, 30);
        assert_eq!(response.usage.completion_tokens, 15);
    }

    #[tokio::test]
    async fn zero_usage_response_is_treated_as_zero_not_an_error() {
        let client = ScriptedClient::new(vec![final_response(Usage::default())]);
        let registry = ToolRegistry::new();
        let response = execute(
            &client,
            "m",
            vec![Message::user("hi")],
            vec![],
            &registry,
            None,
            "trace-5",
            &config(),
        )
        .await
        .unwrap();
        assert_eq!(response.usage, Usage::default());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_provider_call_is_cancelled_at_deadline_and_client_closed() {
        let closed = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let client = SleepyClient {
            delay: std::time::Duration::from_millis(500),
            closed: closed.clone(),
        };
        let registry = ToolRegistry::new();
        let deadline = Instant::now() + std::time::Duration::from_millis(200);
        let err = execute(
            &client,
            "m",
            vec![Message::user("hi")],
            vec![],
            &registry,
            Some(deadline),
            "trace-deadline",
            &config(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RouterError::Cancelled { .. }));
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn later_nonzero_usage_still_accumulates_after_earlier_zero() {
        let client = ScriptedClient::new(vec![
            tool_call_response(Usage::default(), "echo"),
            final_response(Usage::new(40, 10)),
        ]);
        let mut registry = ToolRegistry::new();
        registry.register("echo", Arc::new(Echo));
        let response = execute(
            &client,
            "m",
            vec![Message::user("hi")],
            vec![],
            &registry,
            None,
            "trace-6",
            &config(),
        )
        .await
        .unwrap();
        assert_eq!(response.usage.total_tokens, 50);
    }
}
