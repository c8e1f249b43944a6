//! File management for fnagent.
//!
//! [`LocalFileManager`] keeps an in-process registry of files written under a
//! save directory and implements the core [`FileManager`] trait on top of it.
//!
//! [`FileManager`]: fnagent_core::file::FileManager

pub mod local;

pub use local::{DEFAULT_FILE_PURPOSE, LocalFileManager};
