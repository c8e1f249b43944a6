//! FunctionAgent: the iterative function-calling orchestrator.
//!
//! Each pass asks the model for its next message and acts on it:
//!
//! 1. **Function call**: run the tool, append its result, loop
//! 2. **Plugin answer**: record a plugin step and finish
//! 3. **Clarification**: end the run asking the user for more input
//! 4. **Plain answer**: finish
//!
//! Optional first tools are forced, in order, before the first pass. A run
//! that reaches `max_iterations` passes stops without a model answer and
//! leaves memory untouched.

use async_trait::async_trait;
use fnagent_config::{AgentConfig, AppConfig, FilesConfig};
use fnagent_core::chat_model::ChatModel;
use fnagent_core::error::{AgentError, Error, Result};
use fnagent_core::file::{File, FileManager};
use fnagent_core::memory::Memory;
use fnagent_core::message::{AiAction, Message};
use fnagent_core::tool::{Tool, ToolRegistry};
use fnagent_files::LocalFileManager;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::agent::{AgentCore, AgentOptions, Orchestrator, RunModelOptions};
use crate::callback::{CallbackHandler, CallbackManager};
use crate::schema::{
    AgentResponse, AgentRunEnd, AgentStep, EndReason, PluginStep, ToolInfo, ToolStep,
};

pub const DEFAULT_MAX_ITERATIONS: u32 = 5;

const STOPPED_RESPONSE: &str =
    "The agent run was stopped because the maximum number of iterations was reached.";

/// What one pass produced.
enum NextStep {
    Step(AgentStep),
    End(AgentRunEnd),
}

/// The kind of pass being taken.
enum Pass<'a> {
    /// Force a call to one tool; not counted against the budget.
    Forced(&'a Arc<dyn Tool>),
    Iteration(u32),
}

pub struct FunctionAgent {
    core: AgentCore,
    max_iterations: u32,
    first_tools: Vec<Arc<dyn Tool>>,
}

impl FunctionAgent {
    pub fn builder(llm: Arc<dyn ChatModel>) -> FunctionAgentBuilder {
        FunctionAgentBuilder::new(llm)
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    pub fn first_tools(&self) -> Vec<&str> {
        self.first_tools.iter().map(|t| t.name()).collect()
    }

    pub fn core_mut(&mut self) -> &mut AgentCore {
        &mut self.core
    }

    /// Ask the model for its next message and turn it into steps.
    ///
    /// Returns the steps and the messages to append to the chat history.
    /// `chat_history` itself is left alone.
    async fn take_next_steps(
        &self,
        chat_history: &[Message],
        pass: Pass<'_>,
    ) -> Result<(Vec<NextStep>, Vec<Message>)> {
        match chat_history.last() {
            None => return Err(AgentError::EmptyChatHistory.into()),
            Some(last) if last.is_ai() => {
                return Err(AgentError::InvalidChatHistory(
                    "the last message must not be an AI message".into(),
                )
                .into());
            }
            Some(_) => {}
        }

        let options = match pass {
            Pass::Iteration(index) if index >= self.max_iterations => {
                info!(max_iterations = self.max_iterations, "Iteration budget exhausted");
                let end = AgentRunEnd::new(STOPPED_RESPONSE, EndReason::Stopped);
                return Ok((vec![NextStep::End(end)], Vec::new()));
            }
            Pass::Iteration(index) => {
                debug!(iteration = index, "Agent pass");
                RunModelOptions::default()
            }
            Pass::Forced(tool) => {
                debug!(tool = tool.name(), "Forcing first tool");
                RunModelOptions {
                    functions: Some(vec![tool.function_call_schema()]),
                    tool_choice: Some(tool.name().to_string()),
                    ..Default::default()
                }
            }
        };

        let mut input_messages = self.core.memory().messages().await;
        input_messages.extend_from_slice(chat_history);
        let output = self.core.run_model(input_messages, options).await?;

        let mut steps = Vec::new();
        let mut messages = Vec::new();
        match output.action() {
            AiAction::CallFunction(call) => {
                let response = self.core.run_tool(&call.name, &call.arguments).await?;
                messages.push(Message::function(&call.name, &response.json));
                steps.push(NextStep::Step(AgentStep::Tool(ToolStep {
                    info: ToolInfo {
                        tool_name: call.name.clone(),
                        tool_args: call.arguments.clone(),
                    },
                    result: response.json,
                    input_files: response.input_files,
                    output_files: response.output_files,
                })));
            }
            AiAction::PluginAnswer(plugin) => {
                // The last input is the prompt or the latest tool result.
                let latest_input = chat_history.last().map(Message::content).unwrap_or_default();
                let input_files = self
                    .core
                    .file_manager()
                    .sniff_and_extract_files_from_text(latest_input)
                    .await?;
                steps.push(NextStep::Step(AgentStep::Plugin(PluginStep {
                    info: plugin.clone(),
                    result: output.content.clone(),
                    input_files,
                    output_files: Vec::new(),
                })));
                steps.push(NextStep::End(AgentRunEnd::new(&output.content, EndReason::Finished)));
            }
            AiAction::Clarify => {
                steps.push(NextStep::End(AgentRunEnd::new(&output.content, EndReason::Clarify)));
            }
            AiAction::Finish => {
                steps.push(NextStep::End(AgentRunEnd::new(&output.content, EndReason::Finished)));
            }
        }
        messages.insert(0, output.into());

        Ok((steps, messages))
    }

    /// Build the response, committing the run to memory unless it stopped.
    async fn finalize_run(
        &self,
        end: AgentRunEnd,
        chat_history: Vec<Message>,
        steps: Vec<AgentStep>,
    ) -> Result<AgentResponse> {
        let (Some(first), Some(last)) = (chat_history.first(), chat_history.last()) else {
            return Err(AgentError::EmptyChatHistory.into());
        };

        if end.end_reason != EndReason::Stopped {
            if chat_history.len() < 2 || !first.is_human() || !last.is_ai() {
                return Err(AgentError::InvalidChatHistory(
                    "a completed run must start with a human message and end with an AI message"
                        .into(),
                )
                .into());
            }
            self.core
                .memory()
                .add_messages(vec![first.clone(), last.clone()])
                .await?;
        }

        Ok(AgentResponse::new(end.response, chat_history, steps, end.end_reason))
    }
}

#[async_trait]
impl Orchestrator for FunctionAgent {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    async fn run_core(&self, prompt: &str, files: &[File]) -> Result<AgentResponse> {
        let prompt = self.core.add_file_reprs_to_text(prompt, files).await?;
        let mut chat_history = vec![Message::human(prompt)];
        let mut steps = Vec::new();

        for tool in &self.first_tools {
            let (new_steps, new_messages) =
                self.take_next_steps(&chat_history, Pass::Forced(tool)).await?;
            match <[NextStep; 1]>::try_from(new_steps) {
                Ok([NextStep::Step(step @ AgentStep::Tool(_))]) => {
                    chat_history.extend(new_messages);
                    steps.push(step);
                }
                _ => warn!(tool = tool.name(), "The selected tool was not called"),
            }
        }

        let mut iteration = 0;
        loop {
            let (new_steps, new_messages) =
                self.take_next_steps(&chat_history, Pass::Iteration(iteration)).await?;
            chat_history.extend(new_messages);
            for next in new_steps {
                match next {
                    NextStep::Step(step) => steps.push(step),
                    NextStep::End(end) => return self.finalize_run(end, chat_history, steps).await,
                }
            }
            iteration += 1;
        }
    }
}

impl std::fmt::Debug for FunctionAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionAgent")
            .field("core", &self.core)
            .field("max_iterations", &self.max_iterations)
            .field("first_tools", &self.first_tools())
            .finish()
    }
}

/// Builder for [`FunctionAgent`].
pub struct FunctionAgentBuilder {
    options: AgentOptions,
    max_iterations: u32,
    first_tools: Vec<String>,
}

impl FunctionAgentBuilder {
    pub fn new(llm: Arc<dyn ChatModel>) -> Self {
        Self {
            options: AgentOptions::new(llm),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            first_tools: Vec::new(),
        }
    }

    /// Apply the `[agent]` config section.
    pub fn from_config(llm: Arc<dyn ChatModel>, config: &AgentConfig) -> Self {
        let mut builder = Self::new(llm)
            .max_iterations(config.max_iterations)
            .plugins(config.plugins.clone())
            .first_tools(config.first_tools.clone());
        if let Some(system) = &config.system {
            builder = builder.system(system.clone());
        }
        builder
    }

    /// Apply the `[agent]` and `[files]` config sections.
    pub fn from_app_config(llm: Arc<dyn ChatModel>, config: &AppConfig) -> Self {
        Self::from_config(llm, &config.agent).files_config(&config.files)
    }

    /// Apply the `[files]` config section: a [`LocalFileManager`] under the
    /// configured save dir and the plugins that need no file URLs.
    pub fn files_config(self, config: &FilesConfig) -> Self {
        self.file_manager(Arc::new(LocalFileManager::from_config(config)))
            .plugins_without_file_io(config.plugins_without_file_io.clone())
    }

    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.options.tools = tools;
        self
    }

    pub fn tool(mut self, tool: Arc<dyn Tool>) -> Result<Self> {
        self.options.tools.register(tool)?;
        Ok(self)
    }

    pub fn memory(mut self, memory: Arc<dyn Memory>) -> Self {
        self.options.memory = memory;
        self
    }

    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.options.system = Some(system.into());
        self
    }

    /// Replace the callback handlers. The default is a single `LoggingHandler`.
    pub fn callbacks(mut self, handlers: Vec<Arc<dyn CallbackHandler>>) -> Self {
        self.options.callbacks = CallbackManager::new(handlers);
        self
    }

    pub fn file_manager(mut self, file_manager: Arc<dyn FileManager>) -> Self {
        self.options.file_manager = file_manager;
        self
    }

    pub fn plugins(mut self, plugins: Vec<String>) -> Self {
        self.options.plugins = plugins;
        self
    }

    pub fn plugins_without_file_io(mut self, plugins: Vec<String>) -> Self {
        self.options.plugins_without_file_io = plugins;
        self
    }

    pub fn max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Tools forced, in order, before the first pass.
    pub fn first_tools(mut self, names: Vec<String>) -> Self {
        self.first_tools = names;
        self
    }

    pub async fn build(self) -> Result<FunctionAgent> {
        if self.max_iterations == 0 {
            return Err(AgentError::InvalidMaxIterations(self.max_iterations).into());
        }
        let first_tools = self
            .first_tools
            .iter()
            .map(|name| {
                self.options
                    .tools
                    .get(name)
                    .ok_or_else(|| Error::from(AgentError::UnknownFirstTool(name.clone())))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(FunctionAgent {
            core: AgentCore::new(self.options).await,
            max_iterations: self.max_iterations,
            first_tools,
        })
    }
}
