// crates/router-core/src/types.rs

//! Core data types shared across the router.
//!
//! These are the wire- and pipeline-level structures that flow between the
//! task analyzer, scorer, selector, provider clients, executor, fallback
//! manager and cost tracker. None of these types carry behavior beyond small
//! constructors and invariant checks — the components that operate on them
//! live in `router-orchestrator` and `router-providers`.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// The provider a model is served by.
///
/// `Provider` is the key the [`crate::pool`](../router_orchestrator/pool/index.html)-level
/// client pool uses to decide which credentials and wire format apply.
///
/// # Examples
///
/// ```rust
/// use router_core::types::Provider;
///
/// assert_eq!(Provider::OpenAi.as_str(), "openai");
/// assert_eq!("anthropic".parse::<Provider>().unwrap(), Provider::Anthropic);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    OpenAi,
    Anthropic,
    Google,
    Xai,
    Azure,
    Bedrock,
    Dial,
    Local,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Google => "google",
            Provider::Xai => "xai",
            Provider::Azure => "azure",
            Provider::Bedrock => "bedrock",
            Provider::Dial => "dial",
            Provider::Local => "local",
        }
    }

    pub fn all() -> &'static [Provider] {
        &[
            Provider::OpenAi,
            Provider::Anthropic,
            Provider::Google,
            Provider::Xai,
            Provider::Azure,
            Provider::Bedrock,
            Provider::Dial,
            Provider::Local,
        ]
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "anthropic" => Ok(Provider::Anthropic),
            "google" => Ok(Provider::Google),
            "xai" => Ok(Provider::Xai),
            "azure" => Ok(Provider::Azure),
            "bedrock" => Ok(Provider::Bedrock),
            "dial" => Ok(Provider::Dial),
            "local" => Ok(Provider::Local),
            other => Err(format!("unknown provider: {other}")),
        }
    }
}

/// A tag describing one capability a model has or a requirement it must meet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Reasoning,
    Coding,
    Vision,
    FunctionCalling,
    Streaming,
    LongContext,
}

/// Cost tier a model is assigned to, used as one of the scorer's sub-scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostTier {
    Premium,
    Standard,
    Budget,
    Free,
}

impl CostTier {
    /// Normalized price rank used by the scorer's cost sub-score (higher is cheaper).
    pub fn price_rank(&self) -> f64 {
        match self {
            CostTier::Free => 1.0,
            CostTier::Budget => 0.8,
            CostTier::Standard => 0.5,
            CostTier::Premium => 0.2,
        }
    }
}

/// Quality/speed/reasoning/coding scores on a 0-100 scale, as declared in the registry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ModelScores {
    pub reasoning: u8,
    pub coding: u8,
    pub speed: u8,
    pub quality: u8,
}

/// Identity and metadata of one registered model.
///
/// Loaded once from the model registry YAML at startup and never mutated
/// afterwards; reload replaces the whole table atomically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Unique registry key, e.g. `claude-4-5-sonnet`.
    pub id: String,
    /// Wire identifier sent to the provider, e.g. `claude-3-5-sonnet-20241022`.
    pub api_name: String,
    pub provider: Provider,
    pub context_window: u32,
    #[serde(default)]
    pub capabilities: HashSet<Capability>,
    pub scores: ModelScores,
    pub cost_tier: CostTier,
    #[serde(default)]
    pub aliases: HashSet<String>,
}

impl ModelDescriptor {
    pub fn has_capability(&self, cap: Capability) -> bool {
        self.capabilities.contains(&cap)
    }
}

/// The closed set of task categories the analyzer classifies prompts into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    CodeGeneration,
    Debugging,
    Reasoning,
    ArchitecturalDesign,
    Documentation,
    Testing,
    DataAnalysis,
    CreativeWriting,
    Translation,
    General,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::CodeGeneration => "code_generation",
            TaskType::Debugging => "debugging",
            TaskType::Reasoning => "reasoning",
            TaskType::ArchitecturalDesign => "architectural_design",
            TaskType::Documentation => "documentation",
            TaskType::Testing => "testing",
            TaskType::DataAnalysis => "data_analysis",
            TaskType::CreativeWriting => "creative_writing",
            TaskType::Translation => "translation",
            TaskType::General => "general",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "code_generation" => Ok(TaskType::CodeGeneration),
            "debugging" => Ok(TaskType::Debugging),
            "reasoning" => Ok(TaskType::Reasoning),
            "architectural_design" => Ok(TaskType::ArchitecturalDesign),
            "documentation" => Ok(TaskType::Documentation),
            "testing" => Ok(TaskType::Testing),
            "data_analysis" => Ok(TaskType::DataAnalysis),
            "creative_writing" => Ok(TaskType::CreativeWriting),
            "translation" => Ok(TaskType::Translation),
            "general" => Ok(TaskType::General),
            other => Err(format!("unknown task type: {other}")),
        }
    }
}

/// Selection priority: which of the scorer's sub-scores gets double weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Quality,
    Speed,
    Cost,
    Balanced,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Balanced
    }
}

/// Output of task analysis: what the request needs from a model.
#[derive(Debug, Clone)]
pub struct TaskRequirements {
    pub task_type: TaskType,
    pub confidence: f64,
    pub min_context_window: Option<u32>,
    pub needs_function_calling: bool,
    pub needs_vision: bool,
    pub priority: Priority,
}

impl TaskRequirements {
    pub fn general_fallback() -> Self {
        TaskRequirements {
            task_type: TaskType::General,
            confidence: 0.1,
            min_context_window: None,
            needs_function_calling: false,
            needs_vision: false,
            priority: Priority::Balanced,
        }
    }
}

/// One message in a conversation, OpenAI/Anthropic-shaped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Message {
            role: "user".to_string(),
            content: Some(content.into()),
            tool_call_id: None,
            tool_calls: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Message {
            role: "assistant".to_string(),
            content: Some(content.into()),
            tool_call_id: None,
            tool_calls: None,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Message {
            role: "tool".to_string(),
            content: Some(content.into()),
            tool_call_id: Some(tool_call_id.into()),
            tool_calls: None,
        }
    }
}

/// A model-emitted request to invoke an external function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments_json: String,
}

/// A tool schema advertised to the model, JSON-schema shaped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Input to one provider `ChatCompletion` call.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub model_api_name: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub trace_id: String,
}

/// Why a provider call stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    ToolCall,
    Length,
    Error,
}

/// Token usage for one provider call, or an aggregate across a tool-call loop.
///
/// `total_tokens` is always recomputed as `prompt_tokens + completion_tokens`
/// by whoever constructs this in the executor (see R3 in the billing-integrity
/// rules) — provider-supplied totals are read only at the edge, in the
/// provider client, and never trusted as-is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Usage {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }

    /// Whether `total_tokens == prompt_tokens + completion_tokens` holds (invariant I1).
    pub fn is_consistent(&self) -> bool {
        self.total_tokens == self.prompt_tokens + self.completion_tokens
    }

    pub fn checked_add(&self, other: Usage) -> Option<Usage> {
        Some(Usage::new(
            self.prompt_tokens.checked_add(other.prompt_tokens)?,
            self.completion_tokens.checked_add(other.completion_tokens)?,
        ))
    }
}

/// Result of one provider call.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub content: Option<String>,
    pub tool_call: Option<ToolCall>,
    pub usage: Usage,
    pub model_api_name: String,
    pub finish_reason: FinishReason,
    pub raw: Option<serde_json::Value>,
}

/// Outcome bucket recorded on a `CostEvent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Failed,
    FallbackUsed,
}

/// One cost record emitted per completed orchestration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostEvent {
    pub trace_id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub model_id: String,
    pub provider: Provider,
    pub task_type: TaskType,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub cost_usd_input: f64,
    pub cost_usd_output: f64,
    pub cost_usd_total: f64,
    pub status: RunStatus,
    pub fallback_depth: u32,
}

/// The core's external request surface.
#[derive(Debug, Clone, Default)]
pub struct RouteRequest {
    pub prompt: String,
    pub messages: Vec<Message>,
    pub model_hint: Option<String>,
    pub task_hint: Option<TaskType>,
    pub priority: Option<Priority>,
    pub deadline: Option<std::time::Duration>,
    pub trace_id: Option<String>,
    pub tools: Vec<ToolDefinition>,
}

/// The core's external response surface: the final provider response plus its cost record.
#[derive(Debug, Clone)]
pub struct RouteResponse {
    pub response: ApiResponse,
    pub cost_event: CostEvent,
    pub fallback_depth: u32,
}
