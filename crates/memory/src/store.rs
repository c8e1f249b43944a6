use fnagent_core::message::Message;
use std::collections::VecDeque;

/// Ordered message list plus the separately kept system message.
#[derive(Debug, Default)]
pub(crate) struct MessageStore {
    pub messages: VecDeque<Message>,
    pub system: Option<Message>,
}

impl MessageStore {
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.iter().cloned().collect()
    }
}
