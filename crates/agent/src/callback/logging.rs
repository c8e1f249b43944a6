//! The default handler: reports every event through `tracing`.

use async_trait::async_trait;
use fnagent_core::chat_model::ChatModel;
use fnagent_core::error::Error;
use fnagent_core::file::File;
use fnagent_core::message::{AiAction, AiMessage, Message};
use fnagent_core::tool::Tool;
use tracing::{debug, error, info};

use super::CallbackHandler;
use crate::schema::{AgentResponse, ToolResponse};

/// Logs run, model and tool events.
///
/// Message contents are logged at `debug`, truncated to `max_content_chars`.
#[derive(Debug, Clone)]
pub struct LoggingHandler {
    max_content_chars: usize,
}

impl LoggingHandler {
    pub fn new(max_content_chars: usize) -> Self {
        Self { max_content_chars }
    }

    fn clip<'a>(&self, text: &'a str) -> std::borrow::Cow<'a, str> {
        match text.char_indices().nth(self.max_content_chars) {
            Some((cut, _)) => format!("{}...", &text[..cut]).into(),
            None => text.into(),
        }
    }
}

impl Default for LoggingHandler {
    fn default() -> Self {
        Self::new(500)
    }
}

#[async_trait]
impl CallbackHandler for LoggingHandler {
    async fn on_run_start(&self, prompt: &str, files: &[File]) {
        info!(files = files.len(), "Agent run started");
        debug!(prompt = %self.clip(prompt), "Run input");
    }

    async fn on_model_start(&self, model: &dyn ChatModel, messages: &[Message]) {
        debug!(model = model.model(), messages = messages.len(), "Model call started");
        if let Some(last) = messages.last() {
            debug!(role = ?last.role(), content = %self.clip(last.content()), "Latest input message");
        }
    }

    async fn on_model_end(&self, model: &dyn ChatModel, response: &AiMessage) {
        match response.action() {
            AiAction::CallFunction(call) => {
                info!(model = model.model(), function = %call.name, "Model requested a function call");
                debug!(arguments = %self.clip(&call.arguments), "Function call arguments");
            }
            AiAction::PluginAnswer(plugin) => {
                info!(model = model.model(), plugins = ?plugin.names, "Model answered through a plugin");
            }
            AiAction::Clarify => info!(model = model.model(), "Model asked for clarification"),
            AiAction::Finish => info!(model = model.model(), "Model produced an answer"),
        }
        if let Some(usage) = response.token_usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Model token usage"
            );
        }
        debug!(content = %self.clip(&response.content), "Model output");
    }

    async fn on_model_error(&self, model: &dyn ChatModel, error: &Error) {
        error!(model = model.model(), %error, "Model call failed");
    }

    async fn on_tool_start(&self, tool: &dyn Tool, input_args: &str) {
        info!(tool = tool.name(), "Tool call started");
        debug!(arguments = %self.clip(input_args), "Tool input");
    }

    async fn on_tool_end(&self, tool: &dyn Tool, response: &ToolResponse) {
        info!(
            tool = tool.name(),
            input_files = response.input_files.len(),
            output_files = response.output_files.len(),
            "Tool call finished"
        );
        debug!(result = %self.clip(&response.json), "Tool output");
    }

    async fn on_tool_error(&self, tool: &dyn Tool, error: &Error) {
        error!(tool = tool.name(), %error, "Tool call failed");
    }

    async fn on_run_end(&self, response: &AgentResponse) {
        info!(
            end_reason = %response.end_reason(),
            steps = response.steps().len(),
            "Agent run finished"
        );
        debug!(text = %self.clip(response.text()), "Run output");
    }

    async fn on_run_error(&self, error: &Error) {
        error!(%error, "Agent run failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clips_long_content() {
        let handler = LoggingHandler::new(4);
        assert_eq!(handler.clip("abc"), "abc");
        assert_eq!(handler.clip("abcdef"), "abcd...");
        assert_eq!(handler.clip("日本語のテキスト"), "日本語の...");
    }
}
