//! # fnagent Core
//!
//! Domain types, traits, and error definitions for the fnagent
//! function-calling agent runtime. This crate performs **no I/O**; it
//! defines the domain model that the memory, file, tool and agent crates
//! implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator of the agent loop is a trait here:
//! - [`ChatModel`] performs the model call
//! - [`Tool`] is a callable capability, collected in a [`ToolRegistry`]
//! - [`Memory`] holds the persisted chat history
//! - [`FileManager`] renders, resolves and sniffs files
//!
//! Implementations live in their respective crates, so tests can swap in
//! scripted stand-ins for any of them.

pub mod error;
pub mod message;
pub mod chat_model;
pub mod tool;
pub mod memory;
pub mod file;

// Re-export key types at crate root for ergonomics
pub use error::{AgentError, Error, FileError, MemoryError, ModelError, Result, ToolError};
pub use message::{AiAction, AiMessage, AiMessageChunk, FunctionCall, Message, PluginInfo, Role, TokenUsage};
pub use chat_model::{ChatModel, ChatOutput, ChatRequest, FunctionSchema, ToolChoice};
pub use tool::{Tool, ToolArgs, ToolRegistry};
pub use memory::Memory;
pub use file::{File, FileLocation, FileManager};
