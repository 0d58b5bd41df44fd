//! AWS Bedrock client via the Converse API (`aws-sdk-bedrockruntime`).
//!
//! Bedrock is the one provider in the registry that isn't plain HTTP+JSON:
//! requests are signed with SigV4 and shaped as the SDK's own `Message`/
//! `ContentBlock` types rather than raw `serde_json::Value`. The design
//! calls this out explicitly (§4.4, "Bedrock uses streaming JSON chunks");
//! this client uses the SDK's non-streaming `converse` call and buffers the
//! whole response, which keeps R1-R4 trivial to satisfy (see design notes
//! on streaming as a future extension).

use crate::AiProvider;
use async_trait::async_trait;
use aws_sdk_bedrockruntime::types::{
    ContentBlock, ConversationRole, Message as BrMessage, StopReason as BrStopReason,
    SystemContentBlock, Tool, ToolConfiguration, ToolInputSchema, ToolResultBlock,
    ToolResultContentBlock, ToolSpec, ToolUseBlock,
};
use aws_sdk_bedrock::Client as BedrockControlPlaneClient;
use aws_sdk_bedrockruntime::Client as BedrockRuntimeClient;
use aws_smithy_types::{Document, Number};
use log::debug;
use router_core::auth::EngineAuth;
use router_core::error::{RouterError, RouterResult};
use router_core::types::{ApiRequest, ApiResponse, FinishReason, Provider, ToolCall, Usage};

pub struct BedrockClient {
    client: BedrockRuntimeClient,
    /// Control-plane client used only for `health_check`'s `list_foundation_models`
    /// probe — the runtime client has no bounded, quota-free call of its own.
    control_plane: BedrockControlPlaneClient,
}

impl BedrockClient {
    pub async fn new() -> RouterResult<Self> {
        let creds = EngineAuth::resolve(Provider::Bedrock)?;
        let region = creds.extra.get("region").cloned().ok_or_else(|| {
            RouterError::ProviderUnavailable {
                provider: Provider::Bedrock.to_string(),
                reason: "AWS_REGION not resolved".to_string(),
            }
        })?;
        let access_key = creds.extra.get("access_key_id").cloned().unwrap_or_default();
        let secret_key = creds.extra.get("secret_access_key").cloned().unwrap_or_default();

        let credentials = aws_credential_types::Credentials::new(
            access_key,
            secret_key,
            None,
            None,
            "router-bedrock",
        );
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region))
            .credentials_provider(credentials)
            .load()
            .await;
        Ok(BedrockClient {
            client: BedrockRuntimeClient::new(&config),
            control_plane: BedrockControlPlaneClient::new(&config),
        })
    }

    fn build_messages(&self, request: &ApiRequest) -> RouterResult<(Option<Vec<SystemContentBlock>>, Vec<BrMessage>)> {
        let sdk_err = |reason: String| RouterError::TransientProvider {
            provider: Provider::Bedrock.to_string(),
            reason,
        };

        let mut system: Option<Vec<SystemContentBlock>> = None;
        let mut out = Vec::with_capacity(request.messages.len());
        for m in &request.messages {
            if m.role == "system" {
                system = Some(vec![SystemContentBlock::Text(m.content.clone().unwrap_or_default())]);
                continue;
            }
            if m.role == "tool" {
                let block = ToolResultBlock::builder()
                    .tool_use_id(m.tool_call_id.clone().unwrap_or_default())
                    .content(ToolResultContentBlock::Text(m.content.clone().unwrap_or_default()))
                    .build()
                    .map_err(|e| sdk_err(e.to_string()))?;
                let msg = BrMessage::builder()
                    .role(ConversationRole::User)
                    .content(ContentBlock::ToolResult(block))
                    .build()
                    .map_err(|e| sdk_err(e.to_string()))?;
                out.push(msg);
                continue;
            }
            let role = if m.role == "assistant" {
                ConversationRole::Assistant
            } else {
                ConversationRole::User
            };
            let mut builder = BrMessage::builder().role(role);
            if let Some(text) = &m.content {
                if !text.is_empty() {
                    builder = builder.content(ContentBlock::Text(text.clone()));
                }
            }
            if let Some(tool_calls) = &m.tool_calls {
                for tc in tool_calls {
                    let input: Document = json_to_document(
                        serde_json::from_str(&tc.arguments_json).unwrap_or(serde_json::Value::Null),
                    );
                    let block = ToolUseBlock::builder()
                        .tool_use_id(tc.id.clone())
                        .name(tc.name.clone())
                        .input(input)
                        .build()
                        .map_err(|e| sdk_err(e.to_string()))?;
                    builder = builder.content(ContentBlock::ToolUse(block));
                }
            }
            out.push(builder.build().map_err(|e| sdk_err(e.to_string()))?);
        }
        Ok((system, out))
    }

    fn build_tool_config(&self, request: &ApiRequest) -> RouterResult<Option<ToolConfiguration>> {
        if request.tools.is_empty() {
            return Ok(None);
        }
        let sdk_err = |reason: String| RouterError::TransientProvider {
            provider: Provider::Bedrock.to_string(),
            reason,
        };
        let mut tools = Vec::with_capacity(request.tools.len());
        for t in &request.tools {
            let schema = ToolInputSchema::Json(json_to_document(t.parameters.clone()));
            let spec = ToolSpec::builder()
                .name(t.name.clone())
                .description(t.description.clone())
                .input_schema(schema)
                .build()
                .map_err(|e| sdk_err(e.to_string()))?;
            tools.push(Tool::ToolSpec(spec));
        }
        let config = ToolConfiguration::builder()
            .set_tools(Some(tools))
            .build()
            .map_err(|e| sdk_err(e.to_string()))?;
        Ok(Some(config))
    }

}

fn classify_sdk_error(message: &str) -> RouterError {
    let provider = Provider::Bedrock.to_string();
    let lower = message.to_ascii_lowercase();
    if lower.contains("throttl") || lower.contains("toomanyrequests") {
        RouterError::RateLimited {
            provider,
            retry_after: None,
        }
    } else if lower.contains("accessdenied") || lower.contains("unauthorized") || lower.contains("unrecognizedclient") {
        RouterError::ProviderUnavailable {
            provider,
            reason: message.to_string(),
        }
    } else if lower.contains("too long") || lower.contains("context") {
        RouterError::ContextTooLong {
            provider,
            model: String::new(),
            limit: 0,
        }
    } else if lower.contains("validationexception") {
        RouterError::ContentRejected {
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

fn json_to_document(value: serde_json::Value) -> Document {
    match value {
        serde_json::Value::Null => Document::Null,
        serde_json::Value::Bool(b) => Document::Bool(b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Document::Number(Number::NegInt(i))
            } else if let Some(f) = n.as_f64() {
                Document::Number(Number::Float(f))
            } else {
                Document::Null
            }
        }
        serde_json::Value::String(s) => Document::String(s),
        serde_json::Value::Array(arr) => Document::Array(arr.into_iter().map(json_to_document).collect()),
        serde_json::Value::Object(map) => {
            Document::Object(map.into_iter().map(|(k, v)| (k, json_to_document(v))).collect())
        }
    }
}

#[async_trait]
impl AiProvider for BedrockClient {
    fn provider(&self) -> Provider {
        Provider::Bedrock
    }

    async fn health_check(&self) -> RouterResult<bool> {
        // The runtime client (`converse`) has no bounded probe of its own —
        // every call is a real inference request. `list_foundation_models`
        // lives on the separate control-plane client and costs no quota.
        let result = self.control_plane.list_foundation_models().send().await;
        Ok(result.is_ok())
    }

    async fn chat_completion(&self, request: &ApiRequest) -> RouterResult<ApiResponse> {
        debug!(
            "bedrock chat_completion model={} trace_id={}",
            request.model_api_name, request.trace_id
        );
        let (system, messages) = self.build_messages(request)?;
        let tool_config = self.build_tool_config(request)?;

        let mut call = self
            .client
            .converse()
            .model_id(request.model_api_name.clone())
            .set_messages(Some(messages))
            .set_system(system)
            .set_tool_config(tool_config);

        if let Some(max_tokens) = request.max_tokens {
            call = call.inference_config(
                aws_sdk_bedrockruntime::types::InferenceConfiguration::builder()
                    .max_tokens(max_tokens as i32)
                    .set_temperature(request.temperature)
                    .build(),
            );
        }

        let output = call
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e.to_string()))?;
        debug!("bedrock converse stop_reason={:?}", output.stop_reason);

        let mut content = String::new();
        let mut tool_call: Option<ToolCall> = None;
        if let Some(msg) = output.output.as_ref().and_then(|o| o.as_message().ok()) {
            for block in msg.content.clone() {
                match block {
                    ContentBlock::Text(text) => content.push_str(&text),
                    ContentBlock::ToolUse(tu) => {
                        tool_call = Some(ToolCall {
                            id: tu.tool_use_id,
                            name: tu.name,
                            arguments_json: document_to_json(&tu.input).to_string(),
                        });
                    }
                    _ => {}
                }
            }
        }

        let finish_reason = match output.stop_reason {
            BrStopReason::ToolUse => FinishReason::ToolCall,
            BrStopReason::MaxTokens => FinishReason::Length,
            _ => FinishReason::Stop,
        };

        let usage = output
            .usage
            .map(|u| Usage::new(u.input_tokens.max(0) as u32, u.output_tokens.max(0) as u32))
            .unwrap_or_default();

        Ok(ApiResponse {
            content: if content.is_empty() { None } else { Some(content) },
            tool_call,
            usage,
            model_api_name: request.model_api_name.clone(),
            finish_reason,
            raw: None,
        })
    }

    async fn close(&self) -> RouterResult<()> {
        Ok(())
    }
}

fn document_to_json(doc: &Document) -> serde_json::Value {
    match doc {
        Document::Null => serde_json::Value::Null,
        Document::Bool(b) => serde_json::Value::Bool(*b),
        Document::Number(n) => match n {
            Number::PosInt(v) => serde_json::Value::from(*v),
            Number::NegInt(v) => serde_json::Value::from(*v),
            Number::Float(v) => serde_json::Number::from_f64(*v)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
        },
        Document::String(s) => serde_json::Value::String(s.clone()),
        Document::Array(arr) => serde_json::Value::Array(arr.iter().map(document_to_json).collect()),
        Document::Object(map) => serde_json::Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), document_to_json(v)))
                .collect(),
        ),
    }
}
