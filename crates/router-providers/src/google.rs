//! Google Gemini `generateContent` client. Gemini's wire shape nests turns
//! as `contents[].parts[]` rather than a flat `messages` array and reports
//! tool calls as a `functionCall` part, so this file normalizes both
//! directions the same way `anthropic.rs` normalizes `tool_use` blocks.

use crate::AiProvider;
use async_trait::async_trait;
use router_core::auth::EngineAuth;
use router_core::error::{classify_reqwest_error, RouterError, RouterResult};
use router_core::types::{ApiRequest, ApiResponse, FinishReason, Provider, ToolCall, Usage};
use log::debug;
use serde_json::{json, Value};
use std::time::Duration;

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GoogleClient {
    http: reqwest::Client,
}

impl GoogleClient {
    pub async fn new() -> RouterResult<Self> {
        let creds = EngineAuth::resolve(Provider::Google)?;
        let auth = creds.auth.ok_or_else(|| RouterError::ProviderUnavailable {
            provider: Provider::Google.to_string(),
            reason: "no credential resolved".to_string(),
        })?;
        // Credential travels as the `x-goog-api-key` header (set up by
        // `EngineAuth::resolve`); the REST API also accepts a `key=` query
        // param, but the header form keeps Google consistent with every
        // other client in this crate, none of which put secrets in a URL.
        let http = auth.authenticated_client()?;
        Ok(GoogleClient { http })
    }

    fn build_payload(&self, request: &ApiRequest) -> Value {
        let mut system_instruction: Option<Value> = None;
        let mut contents = Vec::with_capacity(request.messages.len());
        for m in &request.messages {
            if m.role == "system" {
                system_instruction = Some(json!({
                    "parts": [{"text": m.content.clone().unwrap_or_default()}],
                }));
                continue;
            }
            if m.role == "tool" {
                contents.push(json!({
                    "role": "function",
                    "parts": [{
                        "functionResponse": {
                            "name": m.tool_call_id.clone().unwrap_or_default(),
                            "response": {"content": m.content.clone().unwrap_or_default()},
                        },
                    }],
                }));
                continue;
            }
            let role = if m.role == "assistant" { "model" } else { "user" };
            if let Some(tool_calls) = &m.tool_calls {
                let parts: Vec<Value> = tool_calls
                    .iter()
                    .map(|tc| {
                        let args: Value = serde_json::from_str(&tc.arguments_json)
                            .unwrap_or(Value::Object(Default::default()));
                        json!({"functionCall": {"name": tc.name, "args": args}})
                    })
                    .collect();
                contents.push(json!({"role": role, "parts": parts}));
                continue;
            }
            contents.push(json!({
                "role": role,
                "parts": [{"text": m.content.clone().unwrap_or_default()}],
            }));
        }

        let mut payload = json!({ "contents": contents });
        if let Some(system) = system_instruction {
            payload["systemInstruction"] = system;
        }
        let mut generation_config = serde_json::Map::new();
        if let Some(t) = request.temperature {
            generation_config.insert("temperature".to_string(), json!(t));
        }
        if let Some(m) = request.max_tokens {
            generation_config.insert("maxOutputTokens".to_string(), json!(m));
        }
        if !generation_config.is_empty() {
            payload["generationConfig"] = Value::Object(generation_config);
        }
        if !request.tools.is_empty() {
            payload["tools"] = json!([{
                "functionDeclarations": request.tools.iter().map(|t| json!({
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.parameters,
                })).collect::<Vec<_>>(),
            }]);
        }
        payload
    }

    fn parse_response(&self, model_api_name: &str, body: Value) -> RouterResult<ApiResponse> {
        if let Some(err) = body.get("error") {
            let message = err
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown error")
                .to_string();
            let code = err.get("code").and_then(|v| v.as_u64()).unwrap_or(0);
            let status = err.get("status").and_then(|v| v.as_str()).unwrap_or("");
            return Err(self.classify_api_error(code, status, &message));
        }

        let candidate = body
            .get("candidates")
            .and_then(|c| c.get(0))
            .ok_or_else(|| RouterError::TransientProvider {
                provider: Provider::Google.to_string(),
                reason: "response had no candidates".to_string(),
            })?;

        let parts = candidate
            .pointer("/content/parts")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        let mut content = String::new();
        let mut tool_call = None;
        for part in &parts {
            if let Some(text) = part.get("text").and_then(|v| v.as_str()) {
                content.push_str(text);
            }
            if let Some(fc) = part.get("functionCall") {
                tool_call = Some(ToolCall {
                    id: format!("call_{}", uuid::Uuid::new_v4().simple()),
                    name: fc.get("name").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                    arguments_json: fc
                        .get("args")
                        .map(|v| v.to_string())
                        .unwrap_or_else(|| "{}".to_string()),
                });
            }
        }

        let finish_reason = match candidate.get("finishReason").and_then(|v| v.as_str()) {
            Some("MAX_TOKENS") => FinishReason::Length,
            Some("SAFETY") | Some("RECITATION") => FinishReason::Error,
            _ => FinishReason::Stop,
        };
        let finish_reason = if tool_call.is_some() {
            FinishReason::ToolCall
        } else {
            finish_reason
        };

        let usage = body
            .get("usageMetadata")
            .map(|u| {
                let input = u.get("promptTokenCount").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
                let output = u
                    .get("candidatesTokenCount")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0) as u32;
                Usage::new(input, output)
            })
            .unwrap_or_default();

        Ok(ApiResponse {
            content: if content.is_empty() { None } else { Some(content) },
            tool_call,
            usage,
            model_api_name: model_api_name.to_string(),
            finish_reason,
            raw: Some(body),
        })
    }

    fn classify_api_error(&self, code: u64, status: &str, message: &str) -> RouterError {
        let provider = Provider::Google.to_string();
        match code {
            429 => RouterError::RateLimited {
                provider,
                retry_after: None,
            },
            401 | 403 => RouterError::ProviderUnavailable {
                provider,
                reason: message.to_string(),
            },
            400 if status == "INVALID_ARGUMENT" && message.to_ascii_lowercase().contains("token") => {
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
impl AiProvider for GoogleClient {
    fn provider(&self) -> Provider {
        Provider::Google
    }

    async fn health_check(&self) -> RouterResult<bool> {
        let resp = self
            .http
            .get(format!("{BASE_URL}/models"))
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| classify_reqwest_error("google", &e))?;
        Ok(resp.status().is_success())
    }

    async fn chat_completion(&self, request: &ApiRequest) -> RouterResult<ApiResponse> {
        debug!(
            "google chat_completion model={} trace_id={}",
            request.model_api_name, request.trace_id
        );
        let payload = self.build_payload(request);
        let url = format!("{BASE_URL}/models/{}:generateContent", request.model_api_name);
        let resp = self
            .http
            .post(url)
            .json(&payload)
            .timeout(Duration::from_secs(300))
            .send()
            .await
            .map_err(|e| classify_reqwest_error("google", &e))?;

        let status = resp.status();
        debug!("google responded with status={status}");
        let body: Value = resp
            .json()
            .await
            .map_err(|e| classify_reqwest_error("google", &e))?;

        if !status.is_success() {
            let message = body
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|v| v.as_str())
                .unwrap_or("request failed")
                .to_string();
            return Err(self.classify_api_error(status.as_u16() as u64, "", &message));
        }

        self.parse_response(&request.model_api_name, body)
    }

    async fn close(&self) -> RouterResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use router_core::types::Message;

    fn client() -> GoogleClient {
        GoogleClient {
            http: reqwest::Client::new(),
        }
    }

    #[test]
    fn build_payload_maps_assistant_role_to_model() {
        let client = client();
        let request = ApiRequest {
            model_api_name: "gemini-1.5-pro".to_string(),
            messages: vec![Message::user("hi"), Message::assistant("hello")],
            tools: vec![],
            temperature: None,
            max_tokens: None,
            trace_id: "t1".to_string(),
        };
        let payload = client.build_payload(&request);
        assert_eq!(payload["contents"][0]["role"], "user");
        assert_eq!(payload["contents"][1]["role"], "model");
    }

    #[test]
    fn parse_response_extracts_function_call() {
        let client = client();
        let body = json!({
            "candidates": [{
                "content": {"parts": [{"functionCall": {"name": "get_weather", "args": {"city": "nyc"}}}]},
                "finishReason": "STOP",
            }],
            "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 5},
        });
        let resp = client.parse_response("gemini-1.5-pro", body).unwrap();
        assert_eq!(resp.finish_reason, FinishReason::ToolCall);
        assert_eq!(resp.tool_call.unwrap().name, "get_weather");
        assert_eq!(resp.usage.total_tokens, 15);
    }

    #[test]
    fn parse_response_extracts_text() {
        let client = client();
        let body = json!({
            "candidates": [{
                "content": {"parts": [{"text": "hi there"}]},
                "finishReason": "STOP",
            }],
            "usageMetadata": {"promptTokenCount": 3, "candidatesTokenCount": 2},
        });
        let resp = client.parse_response("gemini-1.5-pro", body).unwrap();
        assert_eq!(resp.content.as_deref(), Some("hi there"));
    }

    #[test]
    fn classifies_rate_limit() {
        let client = client();
        let err = client.classify_api_error(429, "", "quota exceeded");
        assert!(matches!(err, RouterError::RateLimited { .. }));
    }
}
