//! Wire types for the Ollama chat and tags endpoints.

use serde::{Deserialize, Serialize};

pub mod models;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    /// Base64-encoded image payloads for vision models.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            images: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            images: None,
        }
    }

    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = Some(images);
        self
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
}

impl ChatRequest {
    /// Streaming is the only mode this client speaks.
    pub fn streaming(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct ChunkMessage {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: String,
}

/// One NDJSON record of a streamed chat reply.
#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct ChatResponseChunk {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub message: Option<ChunkMessage>,
    #[serde(default)]
    pub done: bool,
}

impl ChatResponseChunk {
    pub fn content(&self) -> Option<&str> {
        self.message
            .as_ref()
            .map(|message| message.content.as_str())
            .filter(|content| !content.is_empty())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelTag {
    pub name: String,
    #[serde(default)]
    pub modified_at: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct TagsResponse {
    #[serde(default)]
    pub models: Vec<ModelTag>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_images_only_when_present() {
        let request = ChatRequest::streaming(
            "glm-ocr",
            vec![
                ChatMessage::system("be terse"),
                ChatMessage::user("OCR this image").with_images(vec!["aGk=".into()]),
            ],
        );
        let value = serde_json::to_value(&request).expect("serialize");
        assert_eq!(value["stream"], true);
        assert_eq!(value["messages"][0]["role"], "system");
        assert!(value["messages"][0].get("images").is_none());
        assert_eq!(value["messages"][1]["images"][0], "aGk=");
    }

    #[test]
    fn chunk_tolerates_missing_message() {
        let chunk: ChatResponseChunk =
            serde_json::from_str(r#"{"model":"llama3.2","done":true}"#).expect("parse");
        assert!(chunk.done);
        assert_eq!(chunk.content(), None);

        let chunk: ChatResponseChunk =
            serde_json::from_str(r#"{"message":{"content":"Hel"},"done":false}"#).expect("parse");
        assert_eq!(chunk.content(), Some("Hel"));
    }
}
