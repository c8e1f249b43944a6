//! Configuration loading, validation, and management for fnagent.
//!
//! Loads configuration from `~/.fnagent/config.toml` with environment
//! variable overrides. Validates all settings at load time.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.fnagent/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Agent loop settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Memory configuration
    #[serde(default)]
    pub memory: MemoryConfig,

    /// File handling configuration
    #[serde(default)]
    pub files: FilesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum iterations per run (safety limit)
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// System message sent with every model call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Plugins the model may use
    #[serde(default)]
    pub plugins: Vec<String>,

    /// Tools forced, in order, before the first iteration
    #[serde(default)]
    pub first_tools: Vec<String>,
}

fn default_max_iterations() -> u32 {
    5
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            system: None,
            plugins: vec![],
            first_tools: vec![],
        }
    }
}

/// Which memory implementation to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    #[default]
    Whole,
    SlidingWindow,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default)]
    pub kind: MemoryKind,

    /// Token limit for whole memory (unlimited when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_token_limit: Option<usize>,

    /// Window size for sliding-window memory
    #[serde(default = "default_max_num_messages")]
    pub max_num_messages: usize,
}

fn default_max_num_messages() -> usize {
    20
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            kind: MemoryKind::default(),
            max_token_limit: None,
            max_num_messages: default_max_num_messages(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesConfig {
    /// Where created files are written (OS temp dir when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save_dir: Option<PathBuf>,

    /// Plugins that never fetch files, so prompts need no file URLs for them
    #[serde(default = "default_plugins_without_file_io")]
    pub plugins_without_file_io: Vec<String>,
}

fn default_plugins_without_file_io() -> Vec<String> {
    vec!["eChart".into()]
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            save_dir: None,
            plugins_without_file_io: default_plugins_without_file_io(),
        }
    }
}

impl FilesConfig {
    /// The effective save directory.
    pub fn resolved_save_dir(&self) -> PathBuf {
        self.save_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("fnagent-files"))
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.fnagent/config.toml).
    ///
    /// Environment variables override the file:
    /// - `FNAGENT_MAX_ITERATIONS`
    /// - `FNAGENT_SYSTEM`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".fnagent")
    }

    /// Apply `FNAGENT_*` overrides read through `lookup`, then re-validate.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(raw) = lookup("FNAGENT_MAX_ITERATIONS") {
            self.agent.max_iterations = raw.parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "FNAGENT_MAX_ITERATIONS must be a positive integer, got '{raw}'"
                ))
            })?;
        }
        if let Some(system) = lookup("FNAGENT_SYSTEM") {
            self.agent.system = Some(system);
        }
        self.validate()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be positive".into(),
            ));
        }

        if self.memory.max_token_limit == Some(0) {
            return Err(ConfigError::ValidationError(
                "memory.max_token_limit must be positive".into(),
            ));
        }

        if self.memory.max_num_messages == 0 {
            return Err(ConfigError::ValidationError(
                "memory.max_num_messages must be positive".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
