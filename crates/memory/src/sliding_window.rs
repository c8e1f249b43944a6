//! Sliding-window memory: keeps only the most recent messages.

use async_trait::async_trait;
use fnagent_core::error::MemoryError;
use fnagent_core::memory::Memory;
use fnagent_core::message::Message;
use tokio::sync::RwLock;
use tracing::debug;

use crate::store::MessageStore;

/// A memory holding at most `max_num_messages` messages.
pub struct SlidingWindowMemory {
    store: RwLock<MessageStore>,
    max_num_messages: usize,
}

impl SlidingWindowMemory {
    pub fn new(max_num_messages: usize) -> Result<Self, MemoryError> {
        if max_num_messages == 0 {
            return Err(MemoryError::InvalidLimit(
                "max_num_messages must be positive".into(),
            ));
        }
        Ok(Self {
            store: RwLock::new(MessageStore::default()),
            max_num_messages,
        })
    }

    pub fn max_num_messages(&self) -> usize {
        self.max_num_messages
    }
}

#[async_trait]
impl Memory for SlidingWindowMemory {
    fn name(&self) -> &str {
        "sliding_window"
    }

    async fn messages(&self) -> Vec<Message> {
        self.store.read().await.snapshot()
    }

    async fn add_message(&self, message: Message) -> Result<(), MemoryError> {
        let mut store = self.store.write().await;
        store.messages.push_back(message);
        while store.messages.len() > self.max_num_messages {
            store.messages.pop_front();
            debug!(window = self.max_num_messages, "Dropped oldest message from window");
        }
        Ok(())
    }

    async fn system_message(&self) -> Option<Message> {
        self.store.read().await.system.clone()
    }

    async fn set_system_message(&self, message: Message) {
        self.store.write().await.system = Some(message);
    }

    async fn clear(&self) {
        self.store.write().await.messages.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn window_keeps_most_recent() {
        let mem = SlidingWindowMemory::new(3).unwrap();
        for i in 0..5 {
            mem.add_message(Message::human(format!("message {i}"))).await.unwrap();
        }
        let messages = mem.messages().await;
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].content(), "message 2");
        assert_eq!(messages[2].content(), "message 4");
    }

    #[tokio::test]
    async fn add_messages_appends_all() {
        let mem = SlidingWindowMemory::new(10).unwrap();
        mem.add_messages(vec![Message::human("q"), Message::ai("a")]).await.unwrap();
        assert_eq!(mem.messages().await.len(), 2);
    }

    #[test]
    fn zero_window_rejected() {
        assert!(SlidingWindowMemory::new(0).is_err());
    }
}
