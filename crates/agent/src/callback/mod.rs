//! Callback dispatch around run, model and tool boundaries.
//!
//! For every operation a `*_start` event fires first, followed by exactly
//! one of `*_end` or `*_error`. Handlers observe; they cannot change the
//! outcome of the operation.

mod logging;

pub use logging::LoggingHandler;

use async_trait::async_trait;
use fnagent_core::chat_model::ChatModel;
use fnagent_core::error::Error;
use fnagent_core::file::File;
use fnagent_core::message::{AiMessage, Message};
use fnagent_core::tool::Tool;
use std::sync::Arc;

use crate::schema::{AgentResponse, ToolResponse};

/// Receives agent events. Every method defaults to a no-op.
#[async_trait]
pub trait CallbackHandler: Send + Sync {
    async fn on_run_start(&self, _prompt: &str, _files: &[File]) {}

    async fn on_model_start(&self, _model: &dyn ChatModel, _messages: &[Message]) {}

    async fn on_model_end(&self, _model: &dyn ChatModel, _response: &AiMessage) {}

    async fn on_model_error(&self, _model: &dyn ChatModel, _error: &Error) {}

    async fn on_tool_start(&self, _tool: &dyn Tool, _input_args: &str) {}

    async fn on_tool_end(&self, _tool: &dyn Tool, _response: &ToolResponse) {}

    async fn on_tool_error(&self, _tool: &dyn Tool, _error: &Error) {}

    async fn on_run_end(&self, _response: &AgentResponse) {}

    async fn on_run_error(&self, _error: &Error) {}
}

/// Fans events out to handlers in registration order.
#[derive(Clone, Default)]
pub struct CallbackManager {
    handlers: Vec<Arc<dyn CallbackHandler>>,
}

impl CallbackManager {
    pub fn new(handlers: Vec<Arc<dyn CallbackHandler>>) -> Self {
        Self { handlers }
    }

    /// Register a handler. Returns `false` if this exact handler is already
    /// registered.
    pub fn add_handler(&mut self, handler: Arc<dyn CallbackHandler>) -> bool {
        if self.position(&handler).is_some() {
            return false;
        }
        self.handlers.push(handler);
        true
    }

    /// Unregister a handler. Returns `false` if it was not registered.
    pub fn remove_handler(&mut self, handler: &Arc<dyn CallbackHandler>) -> bool {
        match self.position(handler) {
            Some(index) => {
                self.handlers.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.handlers.clear();
    }

    pub fn handlers(&self) -> &[Arc<dyn CallbackHandler>] {
        &self.handlers
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    fn position(&self, handler: &Arc<dyn CallbackHandler>) -> Option<usize> {
        self.handlers.iter().position(|h| Arc::ptr_eq(h, handler))
    }

    pub async fn on_run_start(&self, prompt: &str, files: &[File]) {
        for handler in &self.handlers {
            handler.on_run_start(prompt, files).await;
        }
    }

    pub async fn on_model_start(&self, model: &dyn ChatModel, messages: &[Message]) {
        for handler in &self.handlers {
            handler.on_model_start(model, messages).await;
        }
    }

    pub async fn on_model_end(&self, model: &dyn ChatModel, response: &AiMessage) {
        for handler in &self.handlers {
            handler.on_model_end(model, response).await;
        }
    }

    pub async fn on_model_error(&self, model: &dyn ChatModel, error: &Error) {
        for handler in &self.handlers {
            handler.on_model_error(model, error).await;
        }
    }

    pub async fn on_tool_start(&self, tool: &dyn Tool, input_args: &str) {
        for handler in &self.handlers {
            handler.on_tool_start(tool, input_args).await;
        }
    }

    pub async fn on_tool_end(&self, tool: &dyn Tool, response: &ToolResponse) {
        for handler in &self.handlers {
            handler.on_tool_end(tool, response).await;
        }
    }

    pub async fn on_tool_error(&self, tool: &dyn Tool, error: &Error) {
        for handler in &self.handlers {
            handler.on_tool_error(tool, error).await;
        }
    }

    pub async fn on_run_end(&self, response: &AgentResponse) {
        for handler in &self.handlers {
            handler.on_run_end(response).await;
        }
    }

    pub async fn on_run_error(&self, error: &Error) {
        for handler in &self.handlers {
            handler.on_run_error(error).await;
        }
    }
}

impl std::fmt::Debug for CallbackManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackManager")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Tagged {
        tag: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl CallbackHandler for Tagged {
        async fn on_run_start(&self, prompt: &str, _files: &[File]) {
            self.log.lock().unwrap().push(format!("{}:{prompt}", self.tag));
        }
    }

    #[tokio::test]
    async fn dispatches_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut manager = CallbackManager::default();
        manager.add_handler(Arc::new(Tagged { tag: "a", log: log.clone() }));
        manager.add_handler(Arc::new(Tagged { tag: "b", log: log.clone() }));

        manager.on_run_start("hi", &[]).await;
        assert_eq!(*log.lock().unwrap(), vec!["a:hi", "b:hi"]);
    }

    #[test]
    fn add_remove_clear() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let handler: Arc<dyn CallbackHandler> = Arc::new(Tagged { tag: "a", log });
        let mut manager = CallbackManager::default();

        assert!(manager.add_handler(handler.clone()));
        assert!(!manager.add_handler(handler.clone()));
        assert_eq!(manager.len(), 1);

        assert!(manager.remove_handler(&handler));
        assert!(!manager.remove_handler(&handler));
        assert!(manager.is_empty());

        manager.add_handler(handler);
        manager.add_handler(Arc::new(LoggingHandler::default()));
        manager.clear();
        assert!(manager.is_empty());
    }
}
