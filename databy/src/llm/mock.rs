//! Scripted chat client for tests and offline runs.

use super::{ChatClient, ChatRequest, ChatResponse};
use crate::errors::LlmError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A chat client that answers from a script.
///
/// Resolution order for each request: the first pattern whose needle occurs
/// in any message, then echo mode, then the scripted responses in rotation.
#[derive(Debug, Default)]
pub struct MockChatClient {
    responses: Vec<String>,
    patterns: Vec<(String, String)>,
    echo_mode: bool,
    failure: Option<LlmError>,
    fail_from: usize,
    call_count: AtomicUsize,
    requests: Mutex<Vec<ChatRequest>>,
}

impl MockChatClient {
    /// Creates a client that cycles through `responses`.
    #[must_use]
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses,
            ..Self::default()
        }
    }

    /// Creates a client that answers with the last message it was sent.
    #[must_use]
    pub fn echo() -> Self {
        Self {
            echo_mode: true,
            ..Self::default()
        }
    }

    /// Creates a client whose every call fails with `error`.
    #[must_use]
    pub fn failing(error: LlmError) -> Self {
        Self {
            failure: Some(error),
            ..Self::default()
        }
    }

    /// Succeeds for the first `calls` calls, then fails every call with
    /// `error`.
    #[must_use]
    pub fn failing_after(mut self, calls: usize, error: LlmError) -> Self {
        self.failure = Some(error);
        self.fail_from = calls;
        self
    }

    /// Answers `response` whenever a message contains `needle`.
    #[must_use]
    pub fn with_pattern(mut self, needle: impl Into<String>, response: impl Into<String>) -> Self {
        self.patterns.push((needle.into(), response.into()));
        self
    }

    /// Returns the number of calls received.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Returns every request received.
    #[must_use]
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().clone()
    }

    /// Resets the call counter and request log.
    pub fn reset(&self) {
        self.call_count.store(0, Ordering::SeqCst);
        self.requests.lock().clear();
    }

    fn answer(&self, request: &ChatRequest, index: usize) -> String {
        let pattern = self.patterns.iter().find(|(needle, _)| {
            request
                .messages
                .iter()
                .any(|m| m.content.contains(needle.as_str()))
        });

        if let Some((_, response)) = pattern {
            return response.clone();
        }

        if self.echo_mode {
            return request
                .messages
                .last()
                .map(|m| m.content.clone())
                .unwrap_or_default();
        }

        if self.responses.is_empty() {
            "mock response".to_string()
        } else {
            self.responses[index % self.responses.len()].clone()
        }
    }
}

#[async_trait]
impl ChatClient for MockChatClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LlmError> {
        let index = self.call_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        match &self.failure {
            Some(error) if index >= self.fail_from => return Err(error.clone()),
            _ => {}
        }

        Ok(ChatResponse::new(request.model.clone(), self.answer(&request, index)))
    }
}
