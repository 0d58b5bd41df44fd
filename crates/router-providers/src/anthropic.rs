//! Anthropic Messages API client. Tool calls arrive as a `tool_use` content
//! block rather than a `tool_calls` array (§4.4) — everything in this file
//! exists to normalize that shape into the common `ApiResponse.tool_call`.

use crate::AiProvider;
use async_trait::async_trait;
use router_core::auth::{AuthManager, EngineAuth};
use router_core::error::{classify_reqwest_error, RouterError, RouterResult};
use router_core::types::{ApiRequest, ApiResponse, FinishReason, Provider, ToolCall, Usage};
use log::debug;
use serde_json::{json, Value};
use std::time::Duration;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const BASE_URL: &str = "https://api.anthropic.com/v1";

pub struct AnthropicClient {
    auth: AuthManager,
    http: reqwest::Client,
}

impl AnthropicClient {
    pub async fn new() -> RouterResult<Self> {
        let creds = EngineAuth::resolve(Provider::Anthropic)?;
        let auth = creds.auth.ok_or_else(|| RouterError::ProviderUnavailable {
            provider: Provider::Anthropic.to_string(),
            reason: "no credential resolved".to_string(),
        })?;
        let http = auth.authenticated_client()?;
        Ok(AnthropicClient { auth, http })
    }

    fn headers_client(&self) -> RouterResult<reqwest::Client> {
        // anthropic-version is a fixed, non-secret header; cheaper to attach
        // per-request than to rebuild the authenticated client for it.
        Ok(self.http.clone())
    }

    fn build_payload(&self, request: &ApiRequest) -> Value {
        // Anthropic separates a leading system message from the turn list.
        let mut system: Option<String> = None;
        let mut messages = Vec::with_capacity(request.messages.len());
        for m in &request.messages {
            if m.role == "system" {
                system = m.content.clone();
                continue;
            }
            if m.role == "tool" {
                messages.push(json!({
                    "role": "user",
                    "content": [{
                        "type": "tool_result",
                        "tool_use_id": m.tool_call_id.clone().unwrap_or_default(),
                        "content": m.content.clone().unwrap_or_default(),
                    }],
                }));
                continue;
            }
            if let Some(tool_calls) = &m.tool_calls {
                let mut blocks = Vec::new();
                if let Some(text) = &m.content {
                    if !text.is_empty() {
                        blocks.push(json!({"type": "text", "text": text}));
                    }
                }
                for tc in tool_calls {
                    let input: Value =
                        serde_json::from_str(&tc.arguments_json).unwrap_or(Value::Object(Default::default()));
                    blocks.push(json!({
                        "type": "tool_use",
                        "id": tc.id,
                        "name": tc.name,
                        "input": input,
                    }));
                }
                messages.push(json!({"role": "assistant", "content": blocks}));
                continue;
            }
            messages.push(json!({
                "role": m.role,
                "content": m.content.clone().unwrap_or_default(),
            }));
        }

        let mut payload = json!({
            "model": request.model_api_name,
            "messages": messages,
            "max_tokens": request.max_tokens.unwrap_or(4096),
        });
        if let Some(system) = system {
            payload["system"] = json!(system);
        }
        if let Some(t) = request.temperature {
            payload["temperature"] = json!(t);
        }
        if !request.tools.is_empty() {
            payload["tools"] = json!(request
                .tools
                .iter()
                .map(|t| json!({
                    "name": t.name,
                    "description": t.description,
                    "input_schema": t.parameters,
                }))
                .collect::<Vec<_>>());
        }
        payload
    }

    fn parse_response(&self, body: Value) -> RouterResult<ApiResponse> {
        if let Some(err) = body.get("error") {
            let message = err
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown error")
                .to_string();
            let kind = err.get("type").and_then(|v| v.as_str()).unwrap_or("");
            return Err(self.classify_api_error(kind, &message));
        }

        let blocks = body
            .get("content")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        let mut content = String::new();
        let mut tool_call = None;
        for block in &blocks {
            match block.get("type").and_then(|v| v.as_str()) {
                Some("text") => {
                    if let Some(text) = block.get("text").and_then(|v| v.as_str()) {
                        content.push_str(text);
                    }
                }
                Some("tool_use") => {
                    tool_call = Some(ToolCall {
                        id: block
                            .get("id")
                            .and_then(|v| v.as_str())
                            .map(|s| s.to_string())
                            .unwrap_or_else(|| format!("toolu_{}", uuid::Uuid::new_v4().simple())),
                        name: block
                            .get("name")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                            .to_string(),
                        arguments_json: block
                            .get("input")
                            .map(|v| v.to_string())
                            .unwrap_or_else(|| "{}".to_string()),
                    });
                }
                _ => {}
            }
        }

        let finish_reason = match body.get("stop_reason").and_then(|v| v.as_str()) {
            Some("tool_use") => FinishReason::ToolCall,
            Some("max_tokens") => FinishReason::Length,
            _ => FinishReason::Stop,
        };
        let finish_reason = if tool_call.is_some() {
            FinishReason::ToolCall
        } else {
            finish_reason
        };

        let usage = body
            .get("usage")
            .map(|u| {
                let input = u.get("input_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
                let output = u.get("output_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
                Usage::new(input, output)
            })
            .unwrap_or_default();

        let model_api_name = body
            .get("model")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        Ok(ApiResponse {
            content: if content.is_empty() { None } else { Some(content) },
            tool_call,
            usage,
            model_api_name,
            finish_reason,
            raw: Some(body),
        })
    }

    fn classify_api_error(&self, kind: &str, message: &str) -> RouterError {
        let provider = Provider::Anthropic.to_string();
        match kind {
            "overloaded_error" | "api_error" => RouterError::TransientProvider {
                provider,
                reason: message.to_string(),
            },
            "rate_limit_error" => RouterError::RateLimited {
                provider,
                retry_after: None,
            },
            "authentication_error" | "permission_error" => RouterError::ProviderUnavailable {
                provider,
                reason: message.to_string(),
            },
            "invalid_request_error" if message.to_ascii_lowercase().contains("token") => {
                RouterError::ContextTooLong {
                    provider,
                    model: String::new(),
                    limit: 0,
                }
            }
            _ => RouterError::TransientProvider {
                provider,
                reason: message.to_string(),
            },
        }
    }
}

#[async_trait]
impl AiProvider for AnthropicClient {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    async fn health_check(&self) -> RouterResult<bool> {
        let client = self.headers_client()?;
        let resp = client
            .get(format!("{BASE_URL}/models"))
            .header("anthropic-version", ANTHROPIC_VERSION)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| classify_reqwest_error("anthropic", &e))?;
        Ok(resp.status().is_success())
    }

    async fn chat_completion(&self, request: &ApiRequest) -> RouterResult<ApiResponse> {
        debug!(
            "anthropic chat_completion model={} trace_id={}",
            request.model_api_name, request.trace_id
        );
        let payload = self.build_payload(request);
        let client = self.headers_client()?;
        let resp = client
            .post(format!("{BASE_URL}/messages"))
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&payload)
            .timeout(Duration::from_secs(300))
            .send()
            .await
            .map_err(|e| classify_reqwest_error("anthropic", &e))?;

        let status = resp.status();
        debug!("anthropic responded with status={status}");
        let body: Value = resp
            .json()
            .await
            .map_err(|e| classify_reqwest_error("anthropic", &e))?;

        if !status.is_success() {
            let message = body
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|v| v.as_str())
                .unwrap_or("request failed")
                .to_string();
            let kind = body
                .get("error")
                .and_then(|e| e.get("type"))
                .and_then(|v| v.as_str())
                .unwrap_or("");
            return Err(self.classify_api_error(kind, &message));
        }

        self.parse_response(body)
    }

    async fn close(&self) -> RouterResult<()> {
        Ok(())
    }
}
