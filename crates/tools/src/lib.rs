//! Built-in tool implementations for fnagent.
//!
//! Small, dependency-free tools that are useful out of the box and in
//! end-to-end tests of the agent loop: formula evaluation and the clock.

pub mod calculator;
pub mod current_time;

pub use calculator::CalculatorTool;
pub use current_time::CurrentTimeTool;

use fnagent_core::error::ToolError;
use fnagent_core::tool::{Tool, ToolRegistry};
use std::sync::Arc;

/// Create a tool registry with all built-in tools.
pub fn default_registry() -> Result<ToolRegistry, ToolError> {
    ToolRegistry::from_tools([
        Arc::new(CalculatorTool) as Arc<dyn Tool>,
        Arc::new(CurrentTimeTool),
    ])
}
