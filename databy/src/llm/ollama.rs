//! Ollama chat client.

use super::{ChatClient, ChatRequest, ChatResponse};
use crate::config::LlmConfig;
use crate::errors::LlmError;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

/// Talks to an Ollama server over `POST {host}/api/chat`.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    host: String,
    client: reqwest::Client,
}

impl OllamaClient {
    /// Creates a client for `host` with the default request timeout.
    pub fn new(host: impl Into<String>) -> Result<Self, LlmError> {
        Self::with_timeout(host, Duration::from_secs(120))
    }

    /// Creates a client with an explicit request timeout.
    pub fn with_timeout(host: impl Into<String>, timeout: Duration) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| LlmError::Transport(err.to_string()))?;

        Ok(Self {
            host: host.into(),
            client,
        })
    }

    /// Creates a client from the LLM settings.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        Self::with_timeout(config.host.clone(), Duration::from_secs(config.timeout_secs))
    }

    /// Returns the default server URL.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    fn chat_url(&self, endpoint: Option<&str>) -> String {
        let base = endpoint.filter(|e| !e.is_empty()).unwrap_or(self.host.as_str());
        format!("{}/api/chat", base.trim_end_matches('/'))
    }
}

#[async_trait]
impl ChatClient for OllamaClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LlmError> {
        let url = self.chat_url(request.endpoint.as_deref());
        debug!(%url, model = %request.model, messages = request.messages.len(), "ollama chat");

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "model": request.model,
                "messages": request.messages,
                "stream": false,
                "options": request.options,
            }))
            .send()
            .await
            .map_err(|err| LlmError::Transport(err.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            warn!(status, %body, "ollama returned an error status");
            return Err(LlmError::Status { status, body });
        }

        response
            .json::<ChatResponse>()
            .await
            .map_err(|err| LlmError::Transport(format!("invalid response body: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_url() {
        let client = OllamaClient::new("http://localhost:11434/").unwrap();
        assert_eq!(client.chat_url(None), "http://localhost:11434/api/chat");
        assert_eq!(client.chat_url(Some("http://gpu:11434")), "http://gpu:11434/api/chat");
        assert_eq!(client.chat_url(Some("")), "http://localhost:11434/api/chat");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_a_transport_error() {
        let client = OllamaClient::with_timeout("http://127.0.0.1:9", Duration::from_millis(200)).unwrap();
        let request = ChatRequest {
            model: "m".to_string(),
            messages: vec![crate::llm::ChatMessage::user("hi")],
            options: crate::llm::ChatOptions::default(),
            endpoint: None,
        };

        assert!(matches!(client.chat(request).await, Err(LlmError::Transport(_))));
    }
}
