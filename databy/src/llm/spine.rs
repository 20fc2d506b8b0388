//! Model callers with an append-only call history.

use super::{ChatClient, ChatMessage, ChatOptions, ChatRequest, ChatResponse, PromptArgs, PromptBuilder};
use crate::config::{ModelConfig, Settings};
use crate::errors::{ConfigError, LlmError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// What was sent to the model for one call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputContent {
    /// The rendered messages.
    pub message: Vec<ChatMessage>,
    /// The arguments as supplied by the caller, before `pre_process`.
    pub raw_input: PromptArgs,
    /// When the request was built.
    pub timestamp: DateTime<Utc>,
}

/// One completed model call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpineListener {
    /// Label of the caller that made the call.
    pub function: String,
    /// The request side.
    pub input: InputContent,
    /// The model answer.
    pub output: ChatResponse,
    /// When the call completed.
    pub created_timestamp: DateTime<Utc>,
}

/// The model calls made during one run, in call order.
///
/// Entries are only ever appended, exactly one per successful call. Clones
/// share the same log, so every stage of a run writes to one history while
/// separate runs never see each other's calls.
#[derive(Debug, Clone, Default)]
pub struct CallHistory {
    entries: Arc<Mutex<Vec<SpineListener>>>,
}

impl CallHistory {
    /// Creates an empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, entry: SpineListener) {
        self.entries.lock().push(entry);
    }

    /// Returns a copy of every entry.
    #[must_use]
    pub fn entries(&self) -> Vec<SpineListener> {
        self.entries.lock().clone()
    }

    /// Returns the entries recorded by the caller labelled `function`.
    #[must_use]
    pub fn for_function(&self, function: &str) -> Vec<SpineListener> {
        self.entries
            .lock()
            .iter()
            .filter(|entry| entry.function == function)
            .cloned()
            .collect()
    }

    /// Returns the number of recorded calls.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if no call has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Returns the model answers in call order.
    #[must_use]
    pub fn outputs(&self) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .map(|entry| entry.output.message.content.clone())
            .collect()
    }
}

/// A model caller bound to one prompt and one catalogue model.
///
/// A caller holds configuration only. Each call is recorded in the
/// [`CallHistory`] passed to it, so one caller can serve many runs.
#[derive(Debug, Clone)]
pub struct Spine {
    label: String,
    model: ModelConfig,
    options: ChatOptions,
    prompt: PromptBuilder,
}

impl Spine {
    /// Creates a caller for the named catalogue model.
    pub fn new(
        label: impl Into<String>,
        model_name: &str,
        prompt: PromptBuilder,
        settings: &Settings,
    ) -> Result<Self, ConfigError> {
        let mut model = settings.model(model_name)?.clone();
        if model.url.is_none() {
            model.url = Some(settings.llm.host.clone());
        }

        Ok(Self {
            label: label.into(),
            model,
            options: settings.llm.options.clone(),
            prompt,
        })
    }

    /// Creates a caller from a prompt catalogue key using the base model.
    pub fn from_prompt_key(
        label: impl Into<String>,
        prompt_key: &str,
        settings: &Settings,
    ) -> Result<Self, ConfigError> {
        let prompt = PromptBuilder::from(settings.prompt(prompt_key)?);
        Self::new(label, crate::config::BASE_MODEL, prompt, settings)
    }

    /// Returns the caller label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the model identifier sent to the server.
    #[must_use]
    pub fn model_id(&self) -> &str {
        &self.model.model_id
    }

    /// Returns the prompt builder.
    #[must_use]
    pub fn prompt(&self) -> &PromptBuilder {
        &self.prompt
    }

    /// Renders `args`, calls the model and records the exchange in `history`.
    pub async fn call(
        &self,
        client: &dyn ChatClient,
        history: &CallHistory,
        raw_input: PromptArgs,
        args: &PromptArgs,
    ) -> Result<ChatResponse, LlmError> {
        let messages = self
            .prompt
            .build_messages(args)
            .map_err(|missing| LlmError::MissingArgument {
                function: self.label.clone(),
                argument: missing.0,
            })?;

        let input = InputContent {
            message: messages.clone(),
            raw_input,
            timestamp: Utc::now(),
        };

        debug!(function = %self.label, model = %self.model.model_id, "calling model");
        let response = client
            .chat(ChatRequest {
                model: self.model.model_id.clone(),
                messages,
                options: self.options.clone(),
                endpoint: self.model.url.clone(),
            })
            .await?;

        history.record(SpineListener {
            function: self.label.clone(),
            input,
            output: response.clone(),
            created_timestamp: Utc::now(),
        });

        Ok(response)
    }
}

/// A prompt-specific model caller.
///
/// Implementors shape the caller's arguments in `pre_process` and may check
/// the answer in `post_process`.
#[async_trait]
pub trait Instruct: Send + Sync {
    /// Returns the underlying caller.
    fn spine(&self) -> &Spine;

    /// Turns caller arguments into prompt arguments.
    fn pre_process(&self, kwargs: &PromptArgs) -> Result<PromptArgs, LlmError>;

    /// Extracts the answer text. Surrounding whitespace is trimmed.
    fn post_process(&self, response: &ChatResponse) -> Result<String, LlmError> {
        Ok(response.content().trim().to_string())
    }

    /// Runs one model call.
    async fn run(
        &self,
        client: &dyn ChatClient,
        history: &CallHistory,
        kwargs: PromptArgs,
    ) -> Result<String, LlmError> {
        let args = self.pre_process(&kwargs)?;
        let response = self.spine().call(client, history, kwargs, &args).await?;
        self.post_process(&response)
    }
}
