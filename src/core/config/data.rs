use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Base URL of the Ollama daemon (e.g., "http://gpu-box:11434")
    #[serde(rename = "aihub:ollama-url", skip_serializing_if = "Option::is_none")]
    pub ollama_url: Option<String>,
    /// Per-tool model overrides
    /// Key: tool id (e.g., "ocr")
    /// Value: model name (e.g., "llava")
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub default_models: BTreeMap<String, String>,
}

/// Get a user-friendly display string for a path
/// Converts absolute paths to use ~ notation on Unix-like systems when possible
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
