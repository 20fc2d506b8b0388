//! Language-model calls.
//!
//! Stages never talk to a model server directly. They hold describer objects
//! implementing [`Instruct`], which render a prompt, call a [`ChatClient`]
//! and record the exchange in the run's append-only [`CallHistory`].

mod describers;
mod mock;
#[cfg(feature = "ollama")]
mod ollama;
mod prompt;
mod spine;

pub use crate::config::ChatOptions;
pub use describers::{ColumnDescriber, DataTyper, DatasetDescriber, NumericTyper, NUMERIC_SUBTYPES};
pub use mock::MockChatClient;
#[cfg(feature = "ollama")]
pub use ollama::OllamaClient;
pub use prompt::{prompt_args, MissingPlaceholder, PromptArgs, PromptBuilder};
pub use spine::{CallHistory, InputContent, Instruct, Spine, SpineListener};

use crate::errors::LlmError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// Instructions for the model.
    System,
    /// User input.
    User,
    /// Model output.
    Assistant,
    /// Tool output.
    Tool,
}

/// One chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The author.
    pub role: ChatRole,
    /// The text.
    pub content: String,
}

impl ChatMessage {
    /// Creates a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    /// Creates a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    /// Creates an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// A non-streaming chat request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Model identifier.
    pub model: String,
    /// Conversation so far.
    pub messages: Vec<ChatMessage>,
    /// Sampling options.
    pub options: ChatOptions,
    /// Server override for this request.
    #[serde(skip)]
    pub endpoint: Option<String>,
}

/// A chat response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Model that answered.
    pub model: String,
    /// The answer.
    pub message: ChatMessage,
    /// Server timestamp, if reported.
    #[serde(default)]
    pub created_at: Option<String>,
    /// Whether generation finished.
    #[serde(default = "default_done")]
    pub done: bool,
}

const fn default_done() -> bool {
    true
}

impl ChatResponse {
    /// Creates a finished assistant response.
    #[must_use]
    pub fn new(model: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            message: ChatMessage::assistant(content),
            created_at: None,
            done: true,
        }
    }

    /// Returns the answer text.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.message.content
    }
}

/// Sends chat requests to a model server.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Sends one request and waits for the full answer.
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LlmError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_roles_serialize_lowercase() {
        let json = serde_json::to_value(ChatMessage::system("hi")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "system", "content": "hi"}));
    }

    #[test]
    fn test_response_parses_server_payload() {
        let payload = serde_json::json!({
            "model": "llama3.2",
            "created_at": "2024-07-01T00:00:00Z",
            "message": {"role": "assistant", "content": "numeric"},
            "done": true,
            "total_duration": 12345
        });
        let response: ChatResponse = serde_json::from_value(payload).unwrap();
        assert_eq!(response.content(), "numeric");
        assert!(response.done);
    }
}
