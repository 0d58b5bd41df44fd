//! Tool handling surface for the Conversation Executor (C8).
//!
//! A [`ToolHandler`] is the "external collaborator" the design calls out in
//! §4.6: the executor invokes it when a model emits a tool call, but the
//! handler's own implementation (filesystem access, shell commands, an HTTP
//! call) is entirely up to the embedding application. This mirrors the
//! teacher's `ToolExecutor`/`ToolRegistry` split in `fluent-agent`, narrowed
//! to the one operation the executor actually needs.

use async_trait::async_trait;
use router_core::error::RouterResult;
use std::collections::HashMap;
use std::sync::Arc;

/// One callable tool. Implementors execute the tool body; the executor owns
/// retries, timeouts and message-history bookkeeping.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Run the tool with its JSON arguments, returning the result to feed
    /// back to the model as a tool message. A `Result::Err` here becomes a
    /// `RouterError::ToolExecution` the executor surfaces to its caller.
    async fn call(&self, arguments_json: &str) -> RouterResult<String>;
}

/// Name-keyed registry of tool handlers, looked up by the executor once per
/// tool call emitted by a model.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        ToolRegistry {
            handlers: HashMap::new(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, handler: Arc<dyn ToolHandler>) {
        self.handlers.insert(name.into(), handler);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.handlers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }
}
