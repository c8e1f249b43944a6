//! Memory implementations for fnagent.
//!
//! - [`WholeMemory`] keeps the entire history, optionally pruned to a token limit
//! - [`SlidingWindowMemory`] keeps the most recent N messages

mod store;
pub mod whole;
pub mod sliding_window;

pub use whole::WholeMemory;
pub use sliding_window::SlidingWindowMemory;

use fnagent_config::{MemoryConfig, MemoryKind};
use fnagent_core::error::MemoryError;
use fnagent_core::memory::Memory;
use std::sync::Arc;

/// Rough token estimate for a piece of text (4 bytes ≈ 1 token).
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

/// Build the memory described by the `[memory]` config section.
pub fn from_config(config: &MemoryConfig) -> Result<Arc<dyn Memory>, MemoryError> {
    let memory: Arc<dyn Memory> = match config.kind {
        MemoryKind::Whole => match config.max_token_limit {
            Some(limit) => Arc::new(WholeMemory::with_token_limit(limit)?),
            None => Arc::new(WholeMemory::new()),
        },
        MemoryKind::SlidingWindow => Arc::new(SlidingWindowMemory::new(config.max_num_messages)?),
    };
    Ok(memory)
}
