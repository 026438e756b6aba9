//! Error types for settings operations.

use crate::core::config::ConfigError;

/// Errors that can occur when modifying configuration settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingError {
    /// The provided setting key is not recognized.
    #[error("Unknown config key: {0}. Known keys: ollama-url, default-model")]
    UnknownKey(String),
    /// The provided tool identifier was not found.
    #[error("Unknown tool: {0}. Run 'aihub tools' to list available tools.")]
    UnknownTool(String),
    /// The value is not an http(s) URL.
    #[error("Invalid URL '{0}': expected something like http://localhost:11434")]
    InvalidUrl(String),
    /// Required arguments are missing.
    #[error("{hint}\nExample: {example}")]
    MissingArgs {
        hint: &'static str,
        example: &'static str,
    },
    /// An error occurred while loading or persisting the configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
