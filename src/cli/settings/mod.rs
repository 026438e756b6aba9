//! Settings management for CLI set/unset commands.
//!
//! Keys:
//! - `ollama-url <url>`: persisted as `aihub:ollama-url`
//! - `default-model <tool> <model>`: per-tool model override

pub mod error;

pub use error::SettingError;

use crate::core::config::data::{path_display, Config};
use crate::core::constants::OLLAMA_BASE_URL;
use crate::core::tools::{find_tool, TOOLS};

const OLLAMA_URL: &str = "ollama-url";
const DEFAULT_MODEL: &str = "default-model";

pub fn set_setting(key: &str, values: &[String]) -> Result<String, SettingError> {
    if values.is_empty() {
        let config = Config::load()?;
        let mut summary = format_settings(&config);
        if let Ok(path) = Config::config_path() {
            summary = format!("Config file: {}\n{summary}", path_display(path));
        }
        return match key {
            OLLAMA_URL | DEFAULT_MODEL => Ok(summary),
            other => Err(SettingError::UnknownKey(other.to_string())),
        };
    }

    let mut outcome = Ok(String::new());
    Config::mutate(|config| outcome = apply_set(config, key, values))?;
    outcome
}

pub fn unset_setting(key: &str, value: Option<&str>) -> Result<String, SettingError> {
    let mut outcome = Ok(String::new());
    Config::mutate(|config| outcome = apply_unset(config, key, value))?;
    outcome
}

pub(crate) fn apply_set(
    config: &mut Config,
    key: &str,
    values: &[String],
) -> Result<String, SettingError> {
    match key {
        OLLAMA_URL => {
            let url = values.join("");
            let url = url.trim();
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(SettingError::InvalidUrl(url.to_string()));
            }
            config.set_ollama_url(url.to_string());
            Ok(format!(
                "Set ollama-url to: {}",
                config.ollama_url().unwrap_or_default()
            ))
        }
        DEFAULT_MODEL => {
            let [tool_id, model @ ..] = values else {
                return Err(missing_default_model_args());
            };
            let model = model.join(" ");
            if model.trim().is_empty() {
                return Err(missing_default_model_args());
            }
            let tool = find_tool(tool_id).ok_or_else(|| SettingError::UnknownTool(tool_id.clone()))?;
            config.set_default_model(tool.id, model.trim().to_string());
            Ok(format!("Set default-model for tool '{}' to: {}", tool.id, model.trim()))
        }
        other => Err(SettingError::UnknownKey(other.to_string())),
    }
}

pub(crate) fn apply_unset(
    config: &mut Config,
    key: &str,
    value: Option<&str>,
) -> Result<String, SettingError> {
    match key {
        OLLAMA_URL => {
            config.unset_ollama_url();
            Ok(format!("Unset ollama-url (now {OLLAMA_BASE_URL})"))
        }
        DEFAULT_MODEL => {
            let tool_id = value.ok_or(SettingError::MissingArgs {
                hint: "To unset a default model, specify the tool:",
                example: "aihub unset default-model ocr",
            })?;
            let tool = find_tool(tool_id).ok_or_else(|| SettingError::UnknownTool(tool_id.to_string()))?;
            config.unset_default_model(tool.id);
            Ok(format!("Unset default-model for tool: {}", tool.id))
        }
        other => Err(SettingError::UnknownKey(other.to_string())),
    }
}

fn missing_default_model_args() -> SettingError {
    SettingError::MissingArgs {
        hint: "To set a default model, specify the tool and model:",
        example: "aihub set default-model ocr llava",
    }
}

pub(crate) fn format_settings(config: &Config) -> String {
    let mut lines = vec![match config.ollama_url() {
        Some(url) => format!("  {OLLAMA_URL}: {url}"),
        None => format!("  {OLLAMA_URL}: {OLLAMA_BASE_URL} (default)"),
    }];
    lines.push(format!("  {DEFAULT_MODEL}:"));
    for tool in TOOLS {
        match config.get_default_model(tool.id) {
            Some(model) => lines.push(format!("    {}: {model}", tool.id)),
            None => lines.push(format!("    {}: {} (default)", tool.id, tool.default_model)),
        }
    }
    lines.join("\n")
}
