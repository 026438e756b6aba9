use std::env;

use tracing::warn;

use crate::core::config::data::Config;
use crate::core::constants::{OLLAMA_BASE_URL, OLLAMA_URL_ENV};
use crate::utils::url::normalize_base_url;

impl Config {
    /// The configured Ollama URL, if any, without trailing slashes.
    pub fn ollama_url(&self) -> Option<String> {
        self.ollama_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(normalize_base_url)
    }

    pub fn set_ollama_url(&mut self, url: String) {
        self.ollama_url = Some(normalize_base_url(url.trim()));
    }

    pub fn unset_ollama_url(&mut self) {
        self.ollama_url = None;
    }

    pub fn get_default_model(&self, tool_id: &str) -> Option<&String> {
        self.default_models.get(&tool_id.to_lowercase())
    }

    pub fn set_default_model(&mut self, tool_id: &str, model: String) {
        self.default_models.insert(tool_id.to_lowercase(), model);
    }

    pub fn unset_default_model(&mut self, tool_id: &str) {
        self.default_models.remove(&tool_id.to_lowercase());
    }

    /// Resolve the base URL for the next request: environment override, then
    /// the persisted setting, then the stock local address.
    pub fn resolve_ollama_url() -> String {
        let config = Config::load().unwrap_or_else(|err| {
            warn!(error = %err, "could not read config; using default Ollama URL");
            Config::default()
        });
        config.effective_ollama_url(env::var(OLLAMA_URL_ENV).ok().as_deref())
    }

    /// The URL to use given an optional environment override.
    pub fn effective_ollama_url(&self, env_override: Option<&str>) -> String {
        env_override
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(normalize_base_url)
            .or_else(|| self.ollama_url())
            .unwrap_or_else(|| OLLAMA_BASE_URL.to_string())
    }
}
