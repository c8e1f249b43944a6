//! ChatModel trait: the abstraction over LLM backends.
//!
//! A ChatModel knows how to send a conversation to an LLM and get a response
//! back, either as a complete message or as a stream of message fragments.
//! Which one is returned is selected by the explicit `stream` flag on the
//! request and surfaced as a [`ChatOutput`] variant.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use crate::error::ModelError;
use crate::message::{AiMessage, AiMessageChunk, Message};

/// A function descriptor sent to the model so it knows what it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSchema {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,

    /// JSON Schema describing the tool's result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responses: Option<serde_json::Value>,

    /// Few-shot example conversation showing how the tool is used
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<Message>,
}

/// A directive forcing the model to call one specific function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolChoice {
    Function { function: ToolChoiceFunction },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolChoiceFunction {
    pub name: String,
}

impl ToolChoice {
    /// Force a call to the named function.
    pub fn function(name: impl Into<String>) -> Self {
        Self::Function {
            function: ToolChoiceFunction { name: name.into() },
        }
    }

    pub fn function_name(&self) -> &str {
        match self {
            Self::Function { function } => &function.name,
        }
    }
}

/// A request to the model backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The conversation messages
    pub messages: Vec<Message>,

    /// Functions the model can call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub functions: Vec<FunctionSchema>,

    /// System instructions, sent out-of-band from the messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Names of the plugins the model may use
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plugins: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,

    /// Whether to stream the response
    #[serde(default)]
    pub stream: bool,

    /// Free-form backend options (`temperature`, `top_p`, ...)
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub options: serde_json::Map<String, serde_json::Value>,
}

/// The output of a model call.
pub enum ChatOutput {
    /// A single complete message (non-streaming request).
    Complete(AiMessage),
    /// A finite, non-restartable sequence of fragments (streaming request).
    Stream(BoxStream<'static, Result<AiMessageChunk, ModelError>>),
}

impl std::fmt::Debug for ChatOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Complete(message) => f.debug_tuple("Complete").field(message).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// The core ChatModel trait.
///
/// Every LLM backend implements this trait. The agent loop only ever calls
/// [`ChatModel::chat_complete`]; streaming is for callers that render tokens.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// The model name (e.g., "ernie-3.5").
    fn model(&self) -> &str;

    /// Send a request. Implementations return `Stream` iff `request.stream`.
    async fn chat(&self, request: ChatRequest) -> Result<ChatOutput, ModelError>;

    /// Send a non-streaming request and get the complete message.
    async fn chat_complete(&self, mut request: ChatRequest) -> Result<AiMessage, ModelError> {
        request.stream = false;
        match self.chat(request).await? {
            ChatOutput::Complete(message) => Ok(message),
            ChatOutput::Stream(_) => Err(ModelError::UnexpectedStream),
        }
    }
}
