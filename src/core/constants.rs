//! Shared constants used across the application

/// Where a stock Ollama install listens.
pub const OLLAMA_BASE_URL: &str = "http://localhost:11434";

/// Config key holding the user's Ollama base URL.
pub const OLLAMA_URL_KEY: &str = "aihub:ollama-url";

/// Environment override for the Ollama base URL.
pub const OLLAMA_URL_ENV: &str = "AIHUB_OLLAMA_URL";

/// Upper bound on image uploads (10 MB).
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

pub const UNEXPECTED_ERROR_MESSAGE: &str = "An unexpected error occurred.";
