//! The agent core and the sealed `run` entry point.
//!
//! [`AgentCore`] owns the collaborators (model, tools, memory, files,
//! callbacks) and wraps every model and tool call with callback events.
//! An orchestrator implements [`Orchestrator::run_core`]; callers go through
//! [`Agent::run`], which every orchestrator gets from a blanket impl and
//! cannot override.

use async_trait::async_trait;
use fnagent_core::chat_model::{ChatModel, ChatRequest, FunctionSchema, ToolChoice};
use fnagent_core::error::{AgentError, Error, Result, ToolError};
use fnagent_core::file::{File, FileManager, protocol};
use fnagent_core::memory::Memory;
use fnagent_core::message::{AiMessage, Message};
use fnagent_core::tool::{Tool, ToolArgs, ToolRegistry};
use fnagent_files::LocalFileManager;
use fnagent_memory::WholeMemory;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

use crate::callback::{CallbackHandler, CallbackManager, LoggingHandler};
use crate::schema::{AgentResponse, ToolResponse};

/// Collaborators and settings for an [`AgentCore`].
pub struct AgentOptions {
    pub llm: Arc<dyn ChatModel>,
    pub tools: ToolRegistry,
    pub memory: Arc<dyn Memory>,
    /// System message; stored into memory when the core is built
    pub system: Option<String>,
    pub callbacks: CallbackManager,
    pub file_manager: Arc<dyn FileManager>,
    pub plugins: Vec<String>,
    /// Plugins that never fetch files out-of-band
    pub plugins_without_file_io: Vec<String>,
}

impl AgentOptions {
    /// Options with an unlimited [`WholeMemory`], a [`LoggingHandler`], and
    /// a [`LocalFileManager`] under the OS temp dir.
    pub fn new(llm: Arc<dyn ChatModel>) -> Self {
        let defaults = fnagent_config::FilesConfig::default();
        let logging: Arc<dyn CallbackHandler> = Arc::new(LoggingHandler::default());
        Self {
            llm,
            tools: ToolRegistry::new(),
            memory: Arc::new(WholeMemory::new()),
            system: None,
            callbacks: CallbackManager::new(vec![logging]),
            file_manager: Arc::new(LocalFileManager::from_config(&defaults)),
            plugins: Vec::new(),
            plugins_without_file_io: defaults.plugins_without_file_io,
        }
    }
}

/// Options for a single model call.
#[derive(Debug, Clone, Default)]
pub struct RunModelOptions {
    /// Functions offered to the model; all registered tools when `None`
    pub functions: Option<Vec<FunctionSchema>>,
    /// Force a call to the named tool
    pub tool_choice: Option<String>,
    /// Backend options passed through untouched
    pub model_options: serde_json::Map<String, serde_json::Value>,
}

pub struct AgentCore {
    llm: Arc<dyn ChatModel>,
    tools: ToolRegistry,
    memory: Arc<dyn Memory>,
    system: Option<String>,
    callbacks: CallbackManager,
    file_manager: Arc<dyn FileManager>,
    plugins: Vec<String>,
    file_needs_url: bool,
    running: AtomicBool,
}

impl AgentCore {
    pub async fn new(options: AgentOptions) -> Self {
        if let Some(system) = &options.system {
            options.memory.set_system_message(Message::system(system.clone())).await;
        }
        let file_needs_url = options
            .plugins
            .iter()
            .any(|p| !options.plugins_without_file_io.contains(p));

        Self {
            llm: options.llm,
            tools: options.tools,
            memory: options.memory,
            system: options.system,
            callbacks: options.callbacks,
            file_manager: options.file_manager,
            plugins: options.plugins,
            file_needs_url,
            running: AtomicBool::new(false),
        }
    }

    pub fn llm(&self) -> &Arc<dyn ChatModel> {
        &self.llm
    }

    pub fn memory(&self) -> &Arc<dyn Memory> {
        &self.memory
    }

    pub fn system(&self) -> Option<&str> {
        self.system.as_deref()
    }

    pub fn callbacks(&self) -> &CallbackManager {
        &self.callbacks
    }

    pub fn callbacks_mut(&mut self) -> &mut CallbackManager {
        &mut self.callbacks
    }

    pub fn file_manager(&self) -> &Arc<dyn FileManager> {
        &self.file_manager
    }

    pub fn plugins(&self) -> &[String] {
        &self.plugins
    }

    /// Whether file reprs must carry a URL for some active plugin.
    pub fn file_needs_url(&self) -> bool {
        self.file_needs_url
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn load_tool(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        self.tools.register(tool)?;
        Ok(())
    }

    pub fn unload_tool(&mut self, name: &str) -> Result<Arc<dyn Tool>> {
        self.tools
            .remove(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()).into())
    }

    pub fn get_tool(&self, name: &str) -> Result<Arc<dyn Tool>> {
        Ok(self.tools.require(name)?)
    }

    pub fn tools(&self) -> Vec<Arc<dyn Tool>> {
        self.tools.tools()
    }

    pub fn tool_registry(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Drop the chat history. The system message is kept.
    pub async fn reset_memory(&self) {
        self.memory.clear().await;
    }

    /// Call the model once, with callbacks around the call.
    ///
    /// Always requests a complete (non-streaming) message.
    pub async fn run_model(
        &self,
        messages: Vec<Message>,
        options: RunModelOptions,
    ) -> Result<AiMessage> {
        self.callbacks.on_model_start(self.llm.as_ref(), &messages).await;

        let request = ChatRequest {
            messages,
            functions: options.functions.unwrap_or_else(|| self.tools.schemas()),
            system: self.system_text().await,
            plugins: self.plugins.clone(),
            tool_choice: options.tool_choice.map(ToolChoice::function),
            stream: false,
            options: options.model_options,
        };

        match self.llm.chat_complete(request).await {
            Ok(message) => {
                self.callbacks.on_model_end(self.llm.as_ref(), &message).await;
                Ok(message)
            }
            Err(e) => {
                let error = Error::from(e);
                self.callbacks.on_model_error(self.llm.as_ref(), &error).await;
                Err(error)
            }
        }
    }

    /// Call a registered tool with JSON-encoded arguments.
    ///
    /// An unknown tool fails before any callback fires.
    pub async fn run_tool(&self, tool_name: &str, tool_args: &str) -> Result<ToolResponse> {
        let tool = self.get_tool(tool_name)?;
        self.callbacks.on_tool_start(tool.as_ref(), tool_args).await;

        match self.invoke_tool(tool.as_ref(), tool_args).await {
            Ok(response) => {
                self.callbacks.on_tool_end(tool.as_ref(), &response).await;
                Ok(response)
            }
            Err(error) => {
                self.callbacks.on_tool_error(tool.as_ref(), &error).await;
                Err(error)
            }
        }
    }

    async fn invoke_tool(&self, tool: &dyn Tool, tool_args: &str) -> Result<ToolResponse> {
        let arguments = parse_tool_args(tool_args)?;
        let input_files = self
            .file_manager
            .sniff_and_extract_files_from_obj(&serde_json::Value::Object(arguments.clone()))
            .await?;

        let result = tool.call(arguments).await?;

        let output_files = if result.is_object() {
            self.file_manager.sniff_and_extract_files_from_obj(&result).await?
        } else {
            Vec::new()
        };

        Ok(ToolResponse {
            json: serde_json::to_string(&result)?,
            input_files,
            output_files,
        })
    }

    /// Append file representations to `text`.
    ///
    /// Text that already mentions file ids is returned unchanged and the
    /// files are ignored.
    pub async fn add_file_reprs_to_text(&self, text: &str, files: &[File]) -> Result<String> {
        if files.is_empty() {
            return Ok(text.to_string());
        }
        if !protocol::find_file_ids(text).is_empty() {
            warn!(
                files = files.len(),
                "Text already contains file ids, so the given files are ignored"
            );
            return Ok(text.to_string());
        }

        let reprs = self
            .file_manager
            .create_file_reprs(files, self.file_needs_url)
            .await?;
        Ok(format!("{text}\n{}", reprs.join("\n")))
    }

    async fn system_text(&self) -> Option<String> {
        match &self.system {
            Some(system) => Some(system.clone()),
            None => self
                .memory
                .system_message()
                .await
                .map(|m| m.content().to_string()),
        }
    }
}

impl std::fmt::Debug for AgentCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentCore")
            .field("model", &self.llm.model())
            .field("tools", &self.tools)
            .field("memory", &self.memory.name())
            .field("plugins", &self.plugins)
            .field("running", &self.is_running())
            .finish()
    }
}

/// Decode tool arguments, which must be a JSON object.
fn parse_tool_args(tool_args: &str) -> std::result::Result<ToolArgs, ToolError> {
    match serde_json::from_str(tool_args) {
        Ok(serde_json::Value::Object(arguments)) => Ok(arguments),
        Ok(other) => Err(ToolError::InvalidArguments(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
        Err(e) => Err(ToolError::InvalidArguments(format!("not valid JSON: {e}"))),
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// Holds the running flag for the duration of a run.
struct RunGuard<'a> {
    running: &'a AtomicBool,
}

impl<'a> RunGuard<'a> {
    fn acquire(running: &'a AtomicBool) -> std::result::Result<Self, AgentError> {
        running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| AgentError::AlreadyRunning)?;
        Ok(Self { running })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

/// A strategy for turning a prompt into a response.
#[async_trait]
pub trait Orchestrator: Send + Sync {
    fn core(&self) -> &AgentCore;

    /// Produce the response for one run. Called only through [`Agent::run`].
    async fn run_core(&self, prompt: &str, files: &[File]) -> Result<AgentResponse>;
}

/// The public entry point, implemented for every [`Orchestrator`].
#[async_trait]
pub trait Agent: Orchestrator {
    /// Run the agent on a prompt.
    ///
    /// Fails with [`AgentError::AlreadyRunning`] while another run on the
    /// same agent is in progress. `on_run_start` fires first, then exactly
    /// one of `on_run_end` or `on_run_error`.
    async fn run(&self, prompt: &str, files: &[File]) -> Result<AgentResponse>;
}

#[async_trait]
impl<T: Orchestrator + ?Sized> Agent for T {
    async fn run(&self, prompt: &str, files: &[File]) -> Result<AgentResponse> {
        let core = self.core();
        let _guard = RunGuard::acquire(&core.running)?;
        debug!(model = core.llm.model(), "Acquired run guard");

        core.callbacks.on_run_start(prompt, files).await;
        match self.run_core(prompt, files).await {
            Ok(response) => {
                core.callbacks.on_run_end(&response).await;
                Ok(response)
            }
            Err(error) => {
                core.callbacks.on_run_error(&error).await;
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{EchoSumTool, RecordingHandler, ScriptedChatModel, core_with};
    use fnagent_core::error::ModelError;
    use fnagent_core::file::FileLocation;

    #[tokio::test]
    async fn run_model_defaults_to_all_tool_schemas() {
        let llm = Arc::new(ScriptedChatModel::new(vec![AiMessage::new("hi")]));
        let core = core_with(llm.clone(), vec![Arc::new(EchoSumTool::default())]).await;

        core.run_model(vec![Message::human("q")], RunModelOptions::default())
            .await
            .unwrap();

        let request = llm.requests().remove(0);
        assert_eq!(request.functions.len(), 1);
        assert_eq!(request.functions[0].name, "add");
        assert!(request.tool_choice.is_none());
        assert!(!request.stream);
    }

    #[tokio::test]
    async fn run_model_forces_tool_choice() {
        let llm = Arc::new(ScriptedChatModel::new(vec![AiMessage::new("hi")]));
        let core = core_with(llm.clone(), vec![Arc::new(EchoSumTool::default())]).await;

        let options = RunModelOptions {
            functions: Some(vec![]),
            tool_choice: Some("add".into()),
            ..Default::default()
        };
        core.run_model(vec![Message::human("q")], options).await.unwrap();

        let request = llm.requests().remove(0);
        assert!(request.functions.is_empty());
        assert_eq!(request.tool_choice, Some(ToolChoice::function("add")));
    }

    #[tokio::test]
    async fn run_model_error_fires_error_callback() {
        let llm = Arc::new(ScriptedChatModel::failing(ModelError::Timeout("slow".into())));
        let recorder = Arc::new(RecordingHandler::default());
        let mut core = core_with(llm, vec![]).await;
        core.callbacks_mut().add_handler(recorder.clone());

        let err = core
            .run_model(vec![Message::human("q")], RunModelOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Model(ModelError::Timeout(_))));
        assert_eq!(recorder.events(), vec!["model_start", "model_error"]);
    }

    #[tokio::test]
    async fn run_tool_serializes_result() {
        let llm = Arc::new(ScriptedChatModel::new(vec![]));
        let add = Arc::new(EchoSumTool::default());
        let recorder = Arc::new(RecordingHandler::default());
        let mut core = core_with(llm, vec![add.clone()]).await;
        core.callbacks_mut().add_handler(recorder.clone());

        let response = core.run_tool("add", r#"{"a": 1, "b": 2}"#).await.unwrap();
        assert_eq!(response.json, "3");
        assert!(response.input_files.is_empty());
        assert!(response.output_files.is_empty());
        assert_eq!(add.calls(), 1);
        assert_eq!(recorder.events(), vec!["tool_start:add", "tool_end:add"]);
    }

    #[tokio::test]
    async fn unknown_tool_fails_before_callbacks() {
        let recorder = Arc::new(RecordingHandler::default());
        let mut core = core_with(Arc::new(ScriptedChatModel::new(vec![])), vec![]).await;
        core.callbacks_mut().add_handler(recorder.clone());

        let err = core.run_tool("missing", "{}").await.unwrap_err();
        assert!(matches!(err, Error::Tool(ToolError::NotFound(name)) if name == "missing"));
        assert!(recorder.events().is_empty());
    }

    #[tokio::test]
    async fn malformed_args_never_reach_the_tool() {
        let add = Arc::new(EchoSumTool::default());
        let recorder = Arc::new(RecordingHandler::default());
        let mut core = core_with(Arc::new(ScriptedChatModel::new(vec![])), vec![add.clone()]).await;
        core.callbacks_mut().add_handler(recorder.clone());

        for bad in ["not json", "[1, 2]", "42", "\"text\"", "null"] {
            let err = core.run_tool("add", bad).await.unwrap_err();
            assert!(
                matches!(err, Error::Tool(ToolError::InvalidArguments(_))),
                "{bad}: {err}"
            );
        }
        assert_eq!(add.calls(), 0);
        assert_eq!(recorder.events().len(), 10);
        assert!(recorder.events().iter().all(|e| e.starts_with("tool_start") || e.starts_with("tool_error")));
    }

    #[tokio::test]
    async fn tool_files_are_sniffed() {
        let dir = tempfile::tempdir().unwrap();
        let files = Arc::new(LocalFileManager::new(dir.path()));
        let input = files
            .create_file_from_bytes(b"in", "in.txt", serde_json::Map::new())
            .await
            .unwrap();

        let mut options = AgentOptions::new(Arc::new(ScriptedChatModel::new(vec![])));
        options.file_manager = files.clone();
        options.tools.register(Arc::new(crate::test_helpers::CopyFileTool::new(files))).unwrap();
        let core = AgentCore::new(options).await;

        let args = serde_json::json!({ "file": input.id }).to_string();
        let response = core.run_tool("copy_file", &args).await.unwrap();
        assert_eq!(response.input_files, vec![input.clone()]);
        assert_eq!(response.output_files.len(), 1);
        assert_ne!(response.output_files[0].id, input.id);
        assert!(response.json.contains(&response.output_files[0].id));
    }

    #[tokio::test]
    async fn add_file_reprs_rules() {
        let dir = tempfile::tempdir().unwrap();
        let files = Arc::new(LocalFileManager::new(dir.path()));
        let file = files
            .create_file_from_bytes(b"x", "x.txt", serde_json::Map::new())
            .await
            .unwrap();

        let mut options = AgentOptions::new(Arc::new(ScriptedChatModel::new(vec![])));
        options.file_manager = files;
        let core = AgentCore::new(options).await;

        assert_eq!(core.add_file_reprs_to_text("hello", &[]).await.unwrap(), "hello");

        let text = core.add_file_reprs_to_text("hello", &[file.clone()]).await.unwrap();
        assert_eq!(text, format!("hello\n<file>{}</file>", file.id));

        let inline = format!("look at {}", file.id);
        let unchanged = core.add_file_reprs_to_text(&inline, &[file]).await.unwrap();
        assert_eq!(unchanged, inline);
    }

    #[tokio::test]
    async fn file_needs_url_follows_plugins() {
        let llm: Arc<dyn ChatModel> = Arc::new(ScriptedChatModel::new(vec![]));

        let mut options = AgentOptions::new(llm.clone());
        options.plugins = vec!["eChart".into()];
        assert!(!AgentCore::new(options).await.file_needs_url());

        let mut options = AgentOptions::new(llm);
        options.plugins = vec!["eChart".into(), "ImageGeneration".into()];
        let core = AgentCore::new(options).await;
        assert!(core.file_needs_url());

        let file = File {
            id: protocol::create_local_file_id(),
            filename: "a.png".into(),
            byte_size: 1,
            created_at: chrono::Utc::now(),
            purpose: "assistants".into(),
            metadata: serde_json::Map::new(),
            location: FileLocation::Remote { url: Some("https://cdn.example/a.png".into()) },
        };
        let text = core.add_file_reprs_to_text("draw", &[file.clone()]).await.unwrap();
        assert!(text.ends_with(&format!("<file>{}</file><url>https://cdn.example/a.png</url>", file.id)));
    }

    #[tokio::test]
    async fn system_message_is_stored_and_sent() {
        let llm = Arc::new(ScriptedChatModel::new(vec![AiMessage::new("ok")]));
        let mut options = AgentOptions::new(llm.clone());
        options.system = Some("Be brief.".into());
        let core = AgentCore::new(options).await;

        assert_eq!(core.memory().system_message().await.unwrap().content(), "Be brief.");
        core.run_model(vec![Message::human("q")], RunModelOptions::default())
            .await
            .unwrap();
        assert_eq!(llm.requests()[0].system.as_deref(), Some("Be brief."));
    }

    #[tokio::test]
    async fn load_and_unload_tools() {
        let mut core = core_with(Arc::new(ScriptedChatModel::new(vec![])), vec![]).await;
        core.load_tool(Arc::new(EchoSumTool::default())).unwrap();
        assert!(core.load_tool(Arc::new(EchoSumTool::default())).is_err());
        assert_eq!(core.tools().len(), 1);

        core.unload_tool("add").unwrap();
        assert!(matches!(core.unload_tool("add"), Err(Error::Tool(ToolError::NotFound(_)))));
        assert!(core.get_tool("add").is_err());
    }

    #[tokio::test]
    async fn guard_releases_on_drop() {
        let core = core_with(Arc::new(ScriptedChatModel::new(vec![])), vec![]).await;
        {
            let _guard = RunGuard::acquire(&core.running).unwrap();
            assert!(core.is_running());
            assert!(RunGuard::acquire(&core.running).is_err());
        }
        assert!(!core.is_running());
    }
}
