//! Shared test helpers: scripted models, small tools, and a recording handler.

use async_trait::async_trait;
use fnagent_core::chat_model::{ChatModel, ChatOutput, ChatRequest};
use fnagent_core::error::{Error, FileError, ModelError, ToolError};
use fnagent_core::file::{File, FileManager};
use fnagent_core::message::{AiMessage, Message};
use fnagent_core::tool::{Tool, ToolArgs, ToolRegistry};
use fnagent_files::LocalFileManager;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

use crate::agent::{AgentCore, AgentOptions};
use crate::callback::{CallbackHandler, CallbackManager};
use crate::schema::{AgentResponse, ToolResponse};

/// A model that replays scripted messages and records every request.
///
/// Panics if called more times than it has messages.
pub struct ScriptedChatModel {
    responses: Mutex<VecDeque<AiMessage>>,
    failure: Option<ModelError>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedChatModel {
    pub fn new(responses: Vec<AiMessage>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            failure: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A model whose every call fails with `error`.
    pub fn failing(error: ModelError) -> Self {
        Self {
            failure: Some(error),
            ..Self::new(vec![])
        }
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatModel for ScriptedChatModel {
    fn model(&self) -> &str {
        "scripted"
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatOutput, ModelError> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len()
        };
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        let message = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("ScriptedChatModel: no response left for call #{call}"));
        Ok(ChatOutput::Complete(message))
    }
}

/// A model that blocks every call until [`GatedChatModel::open`] is called.
pub struct GatedChatModel {
    gate: Semaphore,
    response: AiMessage,
}

impl GatedChatModel {
    pub fn new(response: AiMessage) -> Self {
        Self {
            gate: Semaphore::new(0),
            response,
        }
    }

    pub fn open(&self) {
        self.gate.add_permits(1);
    }
}

#[async_trait]
impl ChatModel for GatedChatModel {
    fn model(&self) -> &str {
        "gated"
    }

    async fn chat(&self, _request: ChatRequest) -> Result<ChatOutput, ModelError> {
        // The permit goes back on drop, so the gate stays open.
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| ModelError::Network(e.to_string()))?;
        Ok(ChatOutput::Complete(self.response.clone()))
    }
}

/// `add(a, b)`: sums two integers and counts its calls.
#[derive(Default)]
pub struct EchoSumTool {
    calls: AtomicUsize,
}

impl EchoSumTool {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Tool for EchoSumTool {
    fn name(&self) -> &str {
        "add"
    }

    fn description(&self) -> &str {
        "Add two integers"
    }

    fn parameters_schema(&self) -> Option<serde_json::Value> {
        Some(serde_json::json!({
            "type": "object",
            "properties": {
                "a": { "type": "integer" },
                "b": { "type": "integer" }
            },
            "required": ["a", "b"]
        }))
    }

    async fn call(&self, arguments: ToolArgs) -> Result<serde_json::Value, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let operand = |key: &str| {
            arguments
                .get(key)
                .and_then(|v| v.as_i64())
                .ok_or_else(|| ToolError::InvalidArguments(format!("'{key}' must be an integer")))
        };
        Ok(serde_json::json!(operand("a")? + operand("b")?))
    }
}

/// `copy_file(file)`: copies a registered file and returns the copy's id.
pub struct CopyFileTool {
    files: Arc<LocalFileManager>,
}

impl CopyFileTool {
    pub fn new(files: Arc<LocalFileManager>) -> Self {
        Self { files }
    }

    async fn copy(&self, file_id: &str) -> Result<File, FileError> {
        let source = self.files.look_up_file_by_id(file_id).await?;
        let contents = self.files.read_contents(&source).await?;
        self.files
            .create_file_from_bytes(contents, &format!("copy-of-{}", source.filename), serde_json::Map::new())
            .await
    }
}

#[async_trait]
impl Tool for CopyFileTool {
    fn name(&self) -> &str {
        "copy_file"
    }

    fn description(&self) -> &str {
        "Copy a file"
    }

    async fn call(&self, arguments: ToolArgs) -> Result<serde_json::Value, ToolError> {
        let file_id = arguments
            .get("file")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments("missing 'file'".into()))?;
        let copy = self.copy(file_id).await.map_err(|e| ToolError::ExecutionFailed {
            tool_name: self.name().to_string(),
            reason: e.to_string(),
        })?;
        Ok(serde_json::json!({ "file": copy.id }))
    }
}

/// Records event names, with the tool name for tool events.
#[derive(Default)]
pub struct RecordingHandler {
    events: Mutex<Vec<String>>,
}

impl RecordingHandler {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }
}

#[async_trait]
impl CallbackHandler for RecordingHandler {
    async fn on_run_start(&self, _prompt: &str, _files: &[File]) {
        self.record("run_start");
    }

    async fn on_model_start(&self, _model: &dyn ChatModel, _messages: &[Message]) {
        self.record("model_start");
    }

    async fn on_model_end(&self, _model: &dyn ChatModel, _response: &AiMessage) {
        self.record("model_end");
    }

    async fn on_model_error(&self, _model: &dyn ChatModel, _error: &Error) {
        self.record("model_error");
    }

    async fn on_tool_start(&self, tool: &dyn Tool, _input_args: &str) {
        self.record(format!("tool_start:{}", tool.name()));
    }

    async fn on_tool_end(&self, tool: &dyn Tool, _response: &ToolResponse) {
        self.record(format!("tool_end:{}", tool.name()));
    }

    async fn on_tool_error(&self, tool: &dyn Tool, _error: &Error) {
        self.record(format!("tool_error:{}", tool.name()));
    }

    async fn on_run_end(&self, _response: &AgentResponse) {
        self.record("run_end");
    }

    async fn on_run_error(&self, _error: &Error) {
        self.record("run_error");
    }
}

/// An agent core with the given tools and no callback handlers.
pub async fn core_with(llm: Arc<dyn ChatModel>, tools: Vec<Arc<dyn Tool>>) -> AgentCore {
    let mut options = AgentOptions::new(llm);
    options.tools = ToolRegistry::from_tools(tools).unwrap();
    options.callbacks = CallbackManager::default();
    AgentCore::new(options).await
}
