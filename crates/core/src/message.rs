//! Message domain types.
//!
//! These are the value objects that flow through the agent loop:
//! the caller's prompt becomes a `Human` message → the model answers with an
//! `Ai` message → a tool result comes back as a `Function` message.
//! Messages are immutable once constructed.

use serde::{Deserialize, Serialize};

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions
    System,
    /// The end user
    User,
    /// The model
    Assistant,
    /// Tool execution result
    Function,
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System {
        content: String,
    },
    #[serde(rename = "user")]
    Human {
        content: String,
    },
    #[serde(rename = "assistant")]
    Ai(AiMessage),
    Function {
        /// Name of the tool that produced this result
        name: String,
        /// The tool result as JSON text
        content: String,
    },
}

impl Message {
    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    /// Create a new human message.
    pub fn human(content: impl Into<String>) -> Self {
        Self::Human {
            content: content.into(),
        }
    }

    /// Create a plain AI message with no function call.
    pub fn ai(content: impl Into<String>) -> Self {
        Self::Ai(AiMessage::new(content))
    }

    /// Create a function (tool result) message.
    pub fn function(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Function {
            name: name.into(),
            content: content.into(),
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Self::System { .. } => Role::System,
            Self::Human { .. } => Role::User,
            Self::Ai(_) => Role::Assistant,
            Self::Function { .. } => Role::Function,
        }
    }

    /// The text content of the message.
    pub fn content(&self) -> &str {
        match self {
            Self::System { content } | Self::Human { content } | Self::Function { content, .. } => {
                content
            }
            Self::Ai(ai) => &ai.content,
        }
    }

    pub fn is_human(&self) -> bool {
        matches!(self, Self::Human { .. })
    }

    pub fn is_ai(&self) -> bool {
        matches!(self, Self::Ai(_))
    }

    pub fn as_ai(&self) -> Option<&AiMessage> {
        match self {
            Self::Ai(ai) => Some(ai),
            _ => None,
        }
    }
}

impl From<AiMessage> for Message {
    fn from(message: AiMessage) -> Self {
        Self::Ai(message)
    }
}

/// A function call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Name of the tool to invoke
    pub name: String,

    /// Arguments as JSON text, exactly as the model produced them
    pub arguments: String,

    /// The model's reasoning before the call, if it reported any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thoughts: Option<String>,
}

impl FunctionCall {
    pub fn new(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: arguments.into(),
            thoughts: None,
        }
    }
}

/// Information about a plugin that answered the request directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginInfo {
    /// Names of the plugins that were invoked
    pub names: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Token usage information reported by the model backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A message produced by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiMessage {
    /// The text content
    pub content: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_info: Option<PluginInfo>,

    /// Whether the model is asking the user for clarification
    #[serde(default)]
    pub clarify: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
}

/// What the agent loop should do with a model message, in priority order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AiAction<'a> {
    CallFunction(&'a FunctionCall),
    PluginAnswer(&'a PluginInfo),
    Clarify,
    Finish,
}

impl AiMessage {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            function_call: None,
            plugin_info: None,
            clarify: false,
            token_usage: None,
        }
    }

    pub fn with_function_call(mut self, call: FunctionCall) -> Self {
        self.function_call = Some(call);
        self
    }

    pub fn with_plugin_info(mut self, info: PluginInfo) -> Self {
        self.plugin_info = Some(info);
        self
    }

    pub fn with_clarify(mut self, clarify: bool) -> Self {
        self.clarify = clarify;
        self
    }

    pub fn with_token_usage(mut self, usage: TokenUsage) -> Self {
        self.token_usage = Some(usage);
        self
    }

    /// Classify the message. A function call wins over plugin info, which
    /// wins over a clarification request.
    pub fn action(&self) -> AiAction<'_> {
        if let Some(call) = &self.function_call {
            AiAction::CallFunction(call)
        } else if let Some(info) = &self.plugin_info {
            AiAction::PluginAnswer(info)
        } else if self.clarify {
            AiAction::Clarify
        } else {
            AiAction::Finish
        }
    }
}

/// A fragment of a streamed model message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AiMessageChunk {
    /// Partial content delta
    #[serde(default)]
    pub content: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,

    /// Usage info (typically only in the final chunk)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
}
