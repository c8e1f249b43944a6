//! Step and response types produced by an agent run.
//!
//! Everything here is created during one `run` and is immutable once the
//! response is handed back to the caller.

use fnagent_core::file::File;
use fnagent_core::message::{Message, PluginInfo};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::annotations::Annotations;

/// The outcome of one tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    /// The tool's raw result, serialized as JSON text
    pub json: String,

    /// Files referenced by the tool arguments
    pub input_files: Vec<File>,

    /// Files referenced by the tool result
    pub output_files: Vec<File>,
}

/// Which tool was called, with the arguments exactly as the model wrote them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInfo {
    pub tool_name: String,
    pub tool_args: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolStep {
    pub info: ToolInfo,
    pub result: String,
    pub input_files: Vec<File>,
    pub output_files: Vec<File>,
}

/// A step where a plugin answered the request directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginStep {
    pub info: PluginInfo,
    pub result: String,
    pub input_files: Vec<File>,
    pub output_files: Vec<File>,
}

/// A terminal step, for callers that want the end of a run in step form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndStep {
    pub end_reason: EndReason,
    pub result: String,
}

/// One entry in a run's audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentStep {
    Tool(ToolStep),
    Plugin(PluginStep),
    End(EndStep),
}

impl AgentStep {
    pub fn input_files(&self) -> &[File] {
        match self {
            Self::Tool(step) => &step.input_files,
            Self::Plugin(step) => &step.input_files,
            Self::End(_) => &[],
        }
    }

    pub fn output_files(&self) -> &[File] {
        match self {
            Self::Tool(step) => &step.output_files,
            Self::Plugin(step) => &step.output_files,
            Self::End(_) => &[],
        }
    }

    /// Input files followed by output files.
    pub fn files(&self) -> impl Iterator<Item = &File> {
        self.input_files().iter().chain(self.output_files())
    }

    pub fn result(&self) -> &str {
        match self {
            Self::Tool(step) => &step.result,
            Self::Plugin(step) => &step.result,
            Self::End(step) => &step.result,
        }
    }
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EndReason {
    /// The model produced a final answer
    Finished,
    /// The iteration budget ran out
    Stopped,
    /// The model asked the user for clarification
    Clarify,
}

impl std::fmt::Display for EndReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Finished => "FINISHED",
            Self::Stopped => "STOPPED",
            Self::Clarify => "CLARIFY",
        })
    }
}

/// The signal that terminates the loop. Never recorded as a step.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentRunEnd {
    pub response: String,
    pub end_reason: EndReason,
}

impl AgentRunEnd {
    pub fn new(response: impl Into<String>, end_reason: EndReason) -> Self {
        Self {
            response: response.into(),
            end_reason,
        }
    }
}

impl From<AgentRunEnd> for EndStep {
    fn from(end: AgentRunEnd) -> Self {
        Self {
            end_reason: end.end_reason,
            result: end.response,
        }
    }
}

/// The final artifact of a run.
#[derive(Debug, Clone)]
pub struct AgentResponse {
    text: String,
    chat_history: Vec<Message>,
    steps: Vec<AgentStep>,
    end_reason: EndReason,
    annotations: OnceLock<Annotations>,
}

impl AgentResponse {
    pub fn new(
        text: impl Into<String>,
        chat_history: Vec<Message>,
        steps: Vec<AgentStep>,
        end_reason: EndReason,
    ) -> Self {
        Self {
            text: text.into(),
            chat_history,
            steps,
            end_reason,
            annotations: OnceLock::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn chat_history(&self) -> &[Message] {
        &self.chat_history
    }

    pub fn steps(&self) -> &[AgentStep] {
        &self.steps
    }

    pub fn end_reason(&self) -> EndReason {
        self.end_reason
    }

    /// The text split into literal and file parts. Computed on first access.
    pub fn annotations(&self) -> &Annotations {
        self.annotations
            .get_or_init(|| Annotations::assemble(&self.text, &self.steps))
    }
}

impl PartialEq for AgentResponse {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
            && self.chat_history == other.chat_history
            && self.steps == other.steps
            && self.end_reason == other.end_reason
    }
}
