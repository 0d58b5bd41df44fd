//! Generic client for every provider that speaks the OpenAI chat-completions
//! wire format: OpenAI itself, xAI, Azure OpenAI, DIAL, and local/Ollama.
//! They differ only in base URL and auth header shape, captured in
//! [`WireProfile`] — this is the "tagged variant of clients behind a small
//! capability set" re-architecture the design calls for, applied to the one
//! family of providers that are genuinely wire-identical.

use crate::AiProvider;
use async_trait::async_trait;
use router_core::auth::{AuthManager, EngineAuth};
use router_core::error::{classify_reqwest_error, RouterError, RouterResult};
use router_core::types::{ApiRequest, ApiResponse, FinishReason, Provider, ToolCall, Usage};
use log::debug;
use serde_json::{json, Value};
use std::time::Duration;

/// Base URL and credential shape for one OpenAI-wire-compatible provider.
pub struct WireProfile {
    pub provider: Provider,
    pub base_url: String,
    pub auth: Option<AuthManager>,
}

impl WireProfile {
    pub fn for_provider(provider: Provider) -> RouterResult<Self> {
        let creds = EngineAuth::resolve(provider)?;
        let base_url = match provider {
            Provider::OpenAi => "https://api.openai.com/v1".to_string(),
            Provider::Xai => "https://api.x.ai/v1".to_string(),
            // Azure's real wire shape is /openai/deployments/{deployment}/chat/completions
            // with an api-version query param; this implementation treats the
            // endpoint env var as already including that path, keeping Azure
            // in the generic OpenAI-compatible family per the design notes.
            Provider::Azure => creds
                .extra
                .get("endpoint")
                .cloned()
                .unwrap_or_default(),
            Provider::Dial => creds.extra.get("endpoint").cloned().unwrap_or_default(),
            Provider::Local => {
                let host = creds
                    .extra
                    .get("host")
                    .cloned()
                    .unwrap_or_else(|| "http://localhost:11434".to_string());
                format!("{}/v1", host.trim_end_matches('/'))
            }
            other => {
                return Err(RouterError::ProviderUnavailable {
                    provider: other.to_string(),
                    reason: "not an OpenAI-wire-compatible provider".to_string(),
                })
            }
        };
        Ok(WireProfile {
            provider,
            base_url,
            auth: creds.auth,
        })
    }
}

pub struct OpenAiCompatibleClient {
    profile: WireProfile,
    http: reqwest::Client,
}

impl OpenAiCompatibleClient {
    pub async fn new(profile: WireProfile) -> RouterResult<Self> {
        let http = match &profile.auth {
            Some(auth) => auth.authenticated_client()?,
            None => reqwest::Client::builder()
                .timeout(Duration::from_secs(120))
                .connect_timeout(Duration::from_secs(10))
                .build()
                .map_err(|e| RouterError::ProviderUnavailable {
                    provider: profile.provider.to_string(),
                    reason: format!("failed to build HTTP client: {e}"),
                })?,
        };
        Ok(OpenAiCompatibleClient { profile, http })
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.profile.base_url.trim_end_matches('/'))
    }

    fn models_url(&self) -> String {
        format!("{}/models", self.profile.base_url.trim_end_matches('/'))
    }

    fn build_payload(&self, request: &ApiRequest) -> Value {
        let mut messages = Vec::with_capacity(request.messages.len());
        for m in &request.messages {
            let mut obj = json!({ "role": m.role });
            if let Some(content) = &m.content {
                obj["content"] = json!(content);
            }
            if let Some(tool_call_id) = &m.tool_call_id {
                obj["tool_call_id"] = json!(tool_call_id);
            }
            if let Some(tool_calls) = &m.tool_calls {
                obj["tool_calls"] = json!(tool_calls
                    .iter()
                    .map(|tc| json!({
                        "id": tc.id,
                        "type": "function",
                        "function": { "name": tc.name, "arguments": tc.arguments_json },
                    }))
                    .collect::<Vec<_>>());
            }
            messages.push(obj);
        }

        let mut payload = json!({
            "model": request.model_api_name,
            "messages": messages,
        });
        if !request.tools.is_empty() {
            payload["tools"] = json!(request
                .tools
                .iter()
                .map(|t| json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    },
                }))
                .collect::<Vec<_>>());
        }
        if let Some(t) = request.temperature {
            payload["temperature"] = json!(t);
        }
        if let Some(m) = request.max_tokens {
            payload["max_tokens"] = json!(m);
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
            return Err(self.classify_api_error(&message));
        }

        let choice = body
            .get("choices")
            .and_then(|c| c.get(0))
            .ok_or_else(|| RouterError::TransientProvider {
                provider: self.profile.provider.to_string(),
                reason: "response had no choices".to_string(),
            })?;

        let message = choice.get("message").cloned().unwrap_or(Value::Null);
        let content = message
            .get("content")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        let tool_call = message
            .get("tool_calls")
            .and_then(|tc| tc.get(0))
            .map(|tc| ToolCall {
                id: tc
                    .get("id")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple())),
                name: tc
                    .pointer("/function/name")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                arguments_json: tc
                    .pointer("/function/arguments")
                    .and_then(|v| v.as_str())
                    .unwrap_or("{}")
                    .to_string(),
            });

        let finish_reason = match choice.get("finish_reason").and_then(|v| v.as_str()) {
            Some("tool_calls") => FinishReason::ToolCall,
            Some("length") => FinishReason::Length,
            Some("stop") | None => FinishReason::Stop,
            Some(_) => FinishReason::Stop,
        };
        let finish_reason = if tool_call.is_some() {
            FinishReason::ToolCall
        } else {
            finish_reason
        };

        let usage = body
            .get("usage")
            .map(|u| Usage {
                prompt_tokens: u.get("prompt_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
                completion_tokens: u
                    .get("completion_tokens")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0) as u32,
                total_tokens: u.get("total_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
            })
            .unwrap_or_default();

        let model_api_name = body
            .get("model")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        Ok(ApiResponse {
            content,
            tool_call,
            usage,
            model_api_name,
            finish_reason,
            raw: Some(body),
        })
    }

    fn classify_api_error(&self, message: &str) -> RouterError {
        let provider = self.profile.provider.to_string();
        let lower = message.to_ascii_lowercase();
        if lower.contains("context") && (lower.contains("length") || lower.contains("token")) {
            RouterError::ContextTooLong {
                provider,
                model: String::new(),
                limit: 0,
            }
        } else if lower.contains("content") || lower.contains("policy") || lower.contains("safety") {
            RouterError::ContentRejected {
                provider,
                reason: message.to_string(),
            }
        } else if lower.contains("rate limit") || lower.contains("429") {
            RouterError::RateLimited {
                provider,
                retry_after: None,
            }
        } else if lower.contains("auth") || lower.contains("api key") || lower.contains("401") {
            RouterError::ProviderUnavailable {
                provider,
                reason: message.to_string(),
            }
        } else {
            RouterError::TransientProvider {
                provider,
                reason: message.to_string(),
            }
        }
    }
}

#[async_trait]
impl AiProvider for OpenAiCompatibleClient {
    fn provider(&self) -> Provider {
        self.profile.provider
    }

    async fn health_check(&self) -> RouterResult<bool> {
        let resp = self
            .http
            .get(self.models_url())
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| classify_reqwest_error(self.profile.provider.as_str(), &e))?;
        Ok(resp.status().is_success())
    }

    async fn chat_completion(&self, request: &ApiRequest) -> RouterResult<ApiResponse> {
        debug!(
            "{} chat_completion model={} trace_id={}",
            self.profile.provider, request.model_api_name, request.trace_id
        );
        let payload = self.build_payload(request);
        let resp = self
            .http
            .post(self.chat_url())
            .json(&payload)
            .timeout(Duration::from_secs(300))
            .send()
            .await
            .map_err(|e| classify_reqwest_error(self.profile.provider.as_str(), &e))?;

        let status = resp.status();
        debug!("{} responded with status={}", self.profile.provider, status);
        let body: Value = resp
            .json()
            .await
            .map_err(|e| classify_reqwest_error(self.profile.provider.as_str(), &e))?;

        if !status.is_success() {
            let message = body
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|v| v.as_str())
                .unwrap_or("request failed")
                .to_string();
            return Err(self.classify_api_error(&message));
        }

        self.parse_response(body)
    }

    async fn close(&self) -> RouterResult<()> {
        Ok(())
    }
}
