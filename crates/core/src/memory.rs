//! Memory trait: the persisted chat history an agent carries across runs.
//!
//! A memory is an ordered list of messages plus one optional system message
//! that is kept apart from the list. The agent reads the whole history at
//! every model call and appends to it only when a run completes.

use async_trait::async_trait;
use crate::error::MemoryError;
use crate::message::Message;

/// The core Memory trait.
///
/// Implementations: whole history (optionally token-limited) and sliding
/// window. If a memory is shared between agents, callers serialize access.
#[async_trait]
pub trait Memory: Send + Sync {
    /// The memory kind (e.g., "whole", "sliding_window").
    fn name(&self) -> &str;

    /// All persisted messages, oldest first. Excludes the system message.
    async fn messages(&self) -> Vec<Message>;

    /// Append one message.
    async fn add_message(&self, message: Message) -> Result<(), MemoryError>;

    /// Append several messages in order.
    async fn add_messages(&self, messages: Vec<Message>) -> Result<(), MemoryError> {
        for message in messages {
            self.add_message(message).await?;
        }
        Ok(())
    }

    /// The persistent system message, if one was set.
    async fn system_message(&self) -> Option<Message>;

    /// Replace the persistent system message.
    async fn set_system_message(&self, message: Message);

    /// Clear the chat history. The system message is kept.
    async fn clear(&self);
}
