//! Tool trait: the abstraction over agent capabilities.
//!
//! Tools are what the model can call through function calling: evaluate a
//! formula, read the clock, fetch a document, and so on.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use crate::chat_model::FunctionSchema;
use crate::error::ToolError;
use crate::message::Message;

/// Named tool arguments, decoded from the model's JSON payload.
pub type ToolArgs = serde_json::Map<String, serde_json::Value>;

/// The core Tool trait.
///
/// Each tool implements this trait and is registered in a [`ToolRegistry`]
/// that the agent resolves function calls against.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "calculator").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> Option<serde_json::Value> {
        None
    }

    /// JSON Schema describing this tool's result.
    fn responses_schema(&self) -> Option<serde_json::Value> {
        None
    }

    /// Example conversation showing the model how to call this tool.
    fn examples(&self) -> Vec<Message> {
        Vec::new()
    }

    /// Invoke the tool. The result may be any JSON value.
    async fn call(&self, arguments: ToolArgs) -> Result<serde_json::Value, ToolError>;

    /// The function-call descriptor sent to the LLM.
    fn function_call_schema(&self) -> FunctionSchema {
        FunctionSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
            responses: self.responses_schema(),
            examples: self.examples(),
        }
    }
}

/// A registry of available tools, kept in registration order.
///
/// The agent uses this to:
/// 1. Export function schemas to send to the LLM
/// 2. Look up tools when the LLM requests a call
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a list of tools, rejecting duplicate names.
    pub fn from_tools(
        tools: impl IntoIterator<Item = Arc<dyn Tool>>,
    ) -> Result<Self, ToolError> {
        let mut registry = Self::new();
        for tool in tools {
            registry.register(tool)?;
        }
        Ok(registry)
    }

    /// Register a tool. Fails if a tool with the same name exists.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(ToolError::AlreadyRegistered(name));
        }
        self.order.push(name.clone());
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Remove a tool by name, returning it if it was registered.
    pub fn remove(&mut self, name: &str) -> Option<Arc<dyn Tool>> {
        let tool = self.tools.remove(name)?;
        self.order.retain(|n| n != name);
        Some(tool)
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Get a tool by name, failing with `NotFound` if absent.
    pub fn require(&self, name: &str) -> Result<Arc<dyn Tool>, ToolError> {
        self.get(name).ok_or_else(|| ToolError::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// All tools, in registration order.
    pub fn tools(&self) -> Vec<Arc<dyn Tool>> {
        self.order.iter().filter_map(|n| self.tools.get(n).cloned()).collect()
    }

    /// Get all function schemas (for sending to the LLM).
    pub fn schemas(&self) -> Vec<FunctionSchema> {
        self.order
            .iter()
            .filter_map(|n| self.tools.get(n))
            .map(|t| t.function_call_schema())
            .collect()
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry").field("tools", &self.order).finish()
    }
}
