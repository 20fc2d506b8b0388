//! Prompt rendering.

use super::ChatMessage;
use crate::config::PromptConfig;
use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Named arguments substituted into prompt placeholders.
pub type PromptArgs = BTreeMap<String, String>;

/// Builds [`PromptArgs`] from key/value pairs.
pub fn prompt_args<I, K, V>(pairs: I) -> PromptArgs
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// A placeholder in a template had no matching argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingPlaceholder(pub String);

#[allow(clippy::expect_used)]
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{|\}\}|\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern is valid")
});

/// Substitutes `{name}` placeholders. `{{` and `}}` render literal braces.
pub fn render(template: &str, args: &PromptArgs) -> Result<String, MissingPlaceholder> {
    let mut missing = None;
    let rendered = PLACEHOLDER.replace_all(template, |caps: &Captures<'_>| {
        match caps.get(1) {
            Some(name) => args.get(name.as_str()).cloned().unwrap_or_else(|| {
                missing.get_or_insert_with(|| name.as_str().to_string());
                String::new()
            }),
            None if &caps[0] == "{{" => "{".to_string(),
            None => "}".to_string(),
        }
    });

    match missing {
        Some(name) => Err(MissingPlaceholder(name)),
        None => Ok(rendered.into_owned()),
    }
}

/// Turns prompt arguments into chat messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptBuilder {
    prompt: String,
    input_template: Option<String>,
}

impl From<&PromptConfig> for PromptBuilder {
    fn from(config: &PromptConfig) -> Self {
        Self {
            prompt: config.prompt.clone(),
            input_template: config.input_template.clone(),
        }
    }
}

impl PromptBuilder {
    /// Creates a builder that renders `prompt` as a system message.
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            input_template: None,
        }
    }

    /// Renders `template` as a user message instead of the system prompt.
    #[must_use]
    pub fn with_input_template(mut self, template: impl Into<String>) -> Self {
        self.input_template = Some(template.into());
        self
    }

    /// Returns the system prompt text.
    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Builds the message list for one call.
    ///
    /// With an input template, every placeholder must be supplied. Without
    /// one, a prompt that cannot be rendered falls back to a user message
    /// holding the raw arguments.
    pub fn build_messages(&self, args: &PromptArgs) -> Result<Vec<ChatMessage>, MissingPlaceholder> {
        if let Some(template) = &self.input_template {
            return Ok(vec![ChatMessage::user(render(template, args)?)]);
        }

        let message = render(&self.prompt, args).map_or_else(
            |_| ChatMessage::user(format!("{args:?}")),
            ChatMessage::system,
        );
        Ok(vec![message])
    }
}
