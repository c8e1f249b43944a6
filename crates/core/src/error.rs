//! Error types for the fnagent domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each collaborator has its own error variant; the agent loop never wraps
//! a collaborator failure in anything but the matching top-level variant.

use thiserror::Error;

/// The top-level error type for all fnagent operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Model errors ---
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Memory errors ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- File errors ---
    #[error("File error: {0}")]
    File(#[from] FileError),

    // --- Agent errors ---
    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ModelError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by model backend, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid model response: {0}")]
    InvalidResponse(String),

    #[error("Model returned a stream where a complete message was requested")]
    UnexpectedStream,
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool already registered: {0}")]
    AlreadyRegistered(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },
}

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Message history is empty after pruning to {limit} tokens; the last message alone exceeds the limit")]
    TokenLimitExceeded { limit: usize },

    #[error("Invalid memory limit: {0}")]
    InvalidLimit(String),
}

#[derive(Debug, Error)]
pub enum FileError {
    #[error("File with ID '{0}' not found")]
    NotFound(String),

    #[error("File with ID '{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("File I/O failed: {0}")]
    Io(String),
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("The agent is already running")]
    AlreadyRunning,

    #[error("Invalid max_iterations value: {0} (must be positive)")]
    InvalidMaxIterations(u32),

    #[error("First tool '{0}' is not in the tool registry")]
    UnknownFirstTool(String),

    #[error("Chat history must not be empty")]
    EmptyChatHistory,

    #[error("Chat history is incomplete or invalid: {0}")]
    InvalidChatHistory(String),
}
