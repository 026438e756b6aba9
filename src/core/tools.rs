//! Registry of the tools the hub offers.

use crate::core::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolDefinition {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub default_model: &'static str,
}

pub const OCR_TOOL_ID: &str = "ocr";
pub const MARKDOWN_TO_JSON_TOOL_ID: &str = "markdown-to-json";
pub const CHAT_TOOL_ID: &str = "chat";

/// Prompt sent alongside the image for OCR.
pub const OCR_PROMPT: &str = "OCR this image";

pub const TOOLS: &[ToolDefinition] = &[
    ToolDefinition {
        id: OCR_TOOL_ID,
        name: "Image OCR",
        description: "Extract text from images",
        default_model: "glm-ocr",
    },
    ToolDefinition {
        id: MARKDOWN_TO_JSON_TOOL_ID,
        name: "Markdown to JSON",
        description: "Extract structured JSON from markdown using a template",
        default_model: "llama3.2",
    },
    ToolDefinition {
        id: CHAT_TOOL_ID,
        name: "Chat",
        description: "Send a single prompt and stream the reply",
        default_model: "llama3.2",
    },
];

pub fn find_tool(id: &str) -> Option<&'static ToolDefinition> {
    TOOLS.iter().find(|tool| tool.id.eq_ignore_ascii_case(id))
}

impl ToolDefinition {
    /// Model to run: explicit choice, then the user's per-tool default, then
    /// the built-in one.
    pub fn resolve_model(&self, explicit: Option<&str>, config: &Config) -> String {
        explicit
            .map(str::trim)
            .filter(|model| !model.is_empty())
            .map(str::to_string)
            .or_else(|| config.get_default_model(self.id).cloned())
            .unwrap_or_else(|| self.default_model.to_string())
    }
}
