//! Whole-history memory: keeps every message, optionally within a token limit.

use async_trait::async_trait;
use fnagent_core::error::MemoryError;
use fnagent_core::memory::Memory;
use fnagent_core::message::Message;
use tokio::sync::RwLock;
use tracing::debug;

use crate::estimate_tokens;
use crate::store::MessageStore;

/// A memory that keeps the whole chat history.
///
/// With a token limit, the oldest messages are dropped while the estimated
/// token total exceeds the limit.
pub struct WholeMemory {
    state: RwLock<WholeState>,
    max_token_limit: Option<usize>,
}

#[derive(Debug, Default)]
struct WholeState {
    store: MessageStore,
    /// Estimated tokens across `store.messages`.
    token_length: usize,
}

impl WholeMemory {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(WholeState::default()),
            max_token_limit: None,
        }
    }

    pub fn with_token_limit(limit: usize) -> Result<Self, MemoryError> {
        if limit == 0 {
            return Err(MemoryError::InvalidLimit(
                "max_token_limit must be positive".into(),
            ));
        }
        Ok(Self {
            max_token_limit: Some(limit),
            ..Self::new()
        })
    }

    /// Estimated tokens currently held.
    pub async fn token_length(&self) -> usize {
        self.state.read().await.token_length
    }
}

impl Default for WholeMemory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Memory for WholeMemory {
    fn name(&self) -> &str {
        "whole"
    }

    async fn messages(&self) -> Vec<Message> {
        self.state.read().await.store.snapshot()
    }

    async fn add_message(&self, message: Message) -> Result<(), MemoryError> {
        let mut state = self.state.write().await;
        let WholeState { store, token_length } = &mut *state;

        *token_length += estimate_tokens(message.content());
        store.messages.push_back(message);

        let Some(limit) = self.max_token_limit else {
            return Ok(());
        };
        while *token_length > limit {
            let Some(dropped) = store.messages.pop_front() else {
                break;
            };
            *token_length -= estimate_tokens(dropped.content());
            debug!(limit, remaining = store.messages.len(), "Pruned oldest message from memory");
        }
        if store.messages.is_empty() {
            *token_length = 0;
            return Err(MemoryError::TokenLimitExceeded { limit });
        }
        Ok(())
    }

    async fn system_message(&self) -> Option<Message> {
        self.state.read().await.store.system.clone()
    }

    async fn set_system_message(&self, message: Message) {
        self.state.write().await.store.system = Some(message);
    }

    async fn clear(&self) {
        let mut state = self.state.write().await;
        state.store.messages.clear();
        state.token_length = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn keeps_messages_in_order() {
        let mem = WholeMemory::new();
        mem.add_message(Message::human("What is regularization?")).await.unwrap();
        mem.add_message(Message::ai("A way to reduce overfitting.")).await.unwrap();

        let messages = mem.messages().await;
        assert_eq!(messages.len(), 2);
        assert!(messages[0].is_human());
        assert!(messages[1].is_ai());
    }

    #[tokio::test]
    async fn message_over_limit_fails() {
        let mem = WholeMemory::with_token_limit(10).unwrap();
        let err = mem
            .add_message(Message::human("What is the purpose of model regularization?"))
            .await
            .unwrap_err();
        assert!(matches!(err, MemoryError::TokenLimitExceeded { limit: 10 }));
        assert!(mem.messages().await.is_empty());
    }

    #[tokio::test]
    async fn prunes_to_token_limit() {
        let mem = WholeMemory::with_token_limit(25).unwrap();
        for _ in 0..3 {
            // 44 bytes ≈ 11 tokens each
            mem.add_message(Message::human("What is the purpose of model regularization?"))
                .await
                .unwrap();
        }
        assert!(mem.token_length().await <= 25);
        assert_eq!(mem.messages().await.len(), 2);
    }

    #[tokio::test]
    async fn system_message_survives_clear() {
        let mem = WholeMemory::new();
        mem.set_system_message(Message::system("Be brief.")).await;
        mem.add_message(Message::human("hi")).await.unwrap();
        mem.clear().await;

        assert!(mem.messages().await.is_empty());
        assert_eq!(mem.token_length().await, 0);
        assert_eq!(mem.system_message().await.unwrap().content(), "Be brief.");
    }

    #[tokio::test]
    async fn token_length_tracks_pruning() {
        let mem = WholeMemory::with_token_limit(4).unwrap();
        mem.add_message(Message::human("abcdefgh")).await.unwrap();
        assert_eq!(mem.token_length().await, 2);
        mem.add_message(Message::ai("abcdefghijkl")).await.unwrap();
        // The first message is pruned, leaving only the second's tokens.
        assert_eq!(mem.token_length().await, 3);
        assert_eq!(mem.messages().await, vec![Message::ai("abcdefghijkl")]);
    }

    #[test]
    fn zero_limit_rejected() {
        assert!(WholeMemory::with_token_limit(0).is_err());
    }
}
