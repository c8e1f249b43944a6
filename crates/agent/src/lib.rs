//! The agent orchestration engine.
//!
//! An agent drives a conversation between a chat model and a set of tools:
//!
//! 1. **Receive** a prompt, with file representations attached
//! 2. **Ask the model** for the next message, given memory + run history
//! 3. **If a function call**: run the tool, append its result, loop back to 2
//! 4. **Otherwise**: finish, clarify, or take the plugin's answer
//!
//! The loop ends on a terminal message or when the iteration budget runs
//! out. Completed runs commit their prompt and answer to memory.

pub mod agent;
pub mod annotations;
pub mod callback;
pub mod function_agent;
pub mod schema;

#[cfg(test)]
mod test_helpers;

pub use agent::{Agent, AgentCore, AgentOptions, Orchestrator, RunModelOptions};
pub use annotations::{Annotations, ContentPart};
pub use callback::{CallbackHandler, CallbackManager, LoggingHandler};
pub use function_agent::{DEFAULT_MAX_ITERATIONS, FunctionAgent, FunctionAgentBuilder};
pub use schema::{
    AgentResponse, AgentRunEnd, AgentStep, EndReason, EndStep, PluginStep, ToolInfo, ToolResponse,
    ToolStep,
};
