//! Settings for the databy agent.
//!
//! Settings are read from a YAML document, filled with built-in defaults for
//! anything omitted, and then adjusted from `DATABY_*` environment variables.
//!
//! ```yaml
//! logging:
//!   level: debug
//! llm:
//!   host: http://localhost:11434
//!   models:
//!     base:
//!       model_id: llama3.2:3b
//! pipeline:
//!   sample_size: 50
//! ```

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Default number of rows sampled for per-column LLM calls.
pub const MIN_SAMPLE_SIZE: usize = 25;

/// Upper bound for the per-column sample.
pub const MAX_SAMPLE_SIZE: usize = 300;

/// Name of the model every describer uses unless told otherwise.
pub const BASE_MODEL: &str = "base";

/// Environment variable naming a settings file for [`Settings::load`].
pub const CONFIG_PATH_ENV: &str = "DATABY_CONFIG";

/// Prompt keys the data explorer pipeline depends on.
pub mod prompt_keys {
    /// Dataset-level description prompt.
    pub const DESCRIBE_DATASET: &str = "describe_dataset";
    /// Per-column description prompt.
    pub const DATASET_META_DESCRIPTION: &str = "dataset_meta_description";
    /// Broad column type prompt.
    pub const DATATYPE: &str = "datatype";
    /// Numeric subtype prompt.
    pub const DATATYPE_NUMERIC: &str = "datatype_numeric";
}

/// Top-level settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Application name, used in log lines.
    pub app_name: String,
    /// Logging options.
    pub logging: LoggingConfig,
    /// Language model options and catalogue.
    pub llm: LlmConfig,
    /// Prompt catalogue keyed by prompt name.
    pub prompts: BTreeMap<String, PromptConfig>,
    /// Pipeline sizing.
    pub pipeline: PipelineConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_name: "databy".to_string(),
            logging: LoggingConfig::default(),
            llm: LlmConfig::default(),
            prompts: default_prompts(),
            pipeline: PipelineConfig::default(),
        }
    }
}

/// Logging options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// An `EnvFilter` directive such as `info` or `databy=debug`.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// A catalogue entry for one model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// The model identifier sent to the server.
    pub model_id: String,
    /// Optional server override for this model.
    #[serde(default)]
    pub url: Option<String>,
}

impl ModelConfig {
    /// Creates a catalogue entry.
    #[must_use]
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            url: None,
        }
    }

    /// Sets a per-model server URL.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// Sampling options sent with every chat request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatOptions {
    /// Context window in tokens.
    pub num_ctx: u32,
    /// Sampling temperature.
    pub temperature: f64,
    /// Nucleus sampling threshold.
    pub top_p: f64,
    /// Top-k sampling.
    pub top_k: u32,
    /// Repetition penalty.
    pub repeat_penalty: f64,
    /// Maximum tokens to generate.
    pub num_predict: u32,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            num_ctx: 1024,
            temperature: 0.3,
            top_p: 0.9,
            top_k: 40,
            repeat_penalty: 1.05,
            num_predict: 128,
        }
    }
}

/// Language model settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of the chat server.
    pub host: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Sampling options.
    pub options: ChatOptions,
    /// Model catalogue. Must contain [`BASE_MODEL`].
    pub models: BTreeMap<String, ModelConfig>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost:11434".to_string(),
            timeout_secs: 120,
            options: ChatOptions::default(),
            models: BTreeMap::from([(
                BASE_MODEL.to_string(),
                ModelConfig::new("hf.co/bartowski/Llama-3.2-3B-Instruct-GGUF:Q3_K_L"),
            )]),
        }
    }
}

/// A prompt definition.
///
/// `prompt` is rendered as a system message. When `input_template` is set it
/// is rendered as a user message instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptConfig {
    /// The prompt text with `{name}` placeholders.
    pub prompt: String,
    /// Optional user-message template.
    #[serde(default)]
    pub input_template: Option<String>,
}

impl PromptConfig {
    /// Creates a system prompt.
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            input_template: None,
        }
    }

    /// Sets the user-message template.
    #[must_use]
    pub fn with_input_template(mut self, template: impl Into<String>) -> Self {
        self.input_template = Some(template.into());
        self
    }
}

/// Pipeline sizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Rows sampled for per-column LLM calls.
    pub sample_size: usize,
    /// Optional deadline for a whole pipeline run.
    pub timeout_secs: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_size: MIN_SAMPLE_SIZE,
            timeout_secs: None,
        }
    }
}

impl PipelineConfig {
    /// Returns the sample size clamped to `[1, MAX_SAMPLE_SIZE]`.
    #[must_use]
    pub fn effective_sample_size(&self) -> usize {
        self.sample_size.clamp(1, MAX_SAMPLE_SIZE)
    }
}

fn default_prompts() -> BTreeMap<String, PromptConfig> {
    BTreeMap::from([
        (
            prompt_keys::DESCRIBE_DATASET.to_string(),
            PromptConfig::new(
                "You are a data analyst. The table below summarises every field of a dataset \
                 with its type, missing values and distinct values.\n\n{data_table}\n\n\
                 Describe in a short paragraph what this dataset is about and what it could be used for.",
            ),
        ),
        (
            prompt_keys::DATASET_META_DESCRIPTION.to_string(),
            PromptConfig::new(
                "You are a data analyst documenting a dataset.\n\
                 Dataset description: {data_description}\n\n\
                 Field name: {data_label}\nSample values:\n{data_samples}\n\n\
                 Describe what this field contains in one sentence.",
            ),
        ),
        (
            prompt_keys::DATATYPE.to_string(),
            PromptConfig::new(
                "Classify the field below. Answer with exactly one word from: \
                 numeric, categorical, text, datetime, boolean, identifier.\n\n\
                 Field name: {data_label}\nSample values:\n{data_samples}",
            ),
        ),
        (
            prompt_keys::DATATYPE_NUMERIC.to_string(),
            PromptConfig::new(
                "The numeric field below needs a semantic subtype. Answer with exactly one word from: \
                 continuous, binary, multi, ordinal, nominal.\n\n\
                 Field name: {data_label}\nSample values:\n{data_samples}",
            ),
        ),
    ])
}

impl Settings {
    /// Parses settings from a YAML string and validates them.
    ///
    /// Prompts missing from the document keep their built-in defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let mut settings: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(yaml)?
        };

        for (key, prompt) in default_prompts() {
            settings.prompts.entry(key).or_insert(prompt);
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Reads settings from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    /// Loads settings from `DATABY_CONFIG` if set, otherwise defaults, then
    /// applies environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut settings = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.is_empty() => Self::from_yaml_file(path)?,
            _ => Self::default(),
        };
        settings.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    /// Applies `DATABY_LOG_LEVEL`, `DATABY_LOG_JSON`, `OLLAMA_HOST_URL` and
    /// `DATABY_SAMPLE_SIZE` using the given lookup.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup("DATABY_LOG_LEVEL").filter(|v| !v.is_empty()) {
            self.logging.level = level;
        }

        if let Some(json) = lookup("DATABY_LOG_JSON").filter(|v| !v.is_empty()) {
            self.logging.json = matches!(json.to_lowercase().as_str(), "1" | "true" | "yes");
        }

        if let Some(host) = lookup("OLLAMA_HOST_URL").filter(|v| !v.is_empty()) {
            self.llm.host = host;
        }

        if let Some(size) = lookup("DATABY_SAMPLE_SIZE").filter(|v| !v.is_empty()) {
            self.pipeline.sample_size =
                size.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    key: "DATABY_SAMPLE_SIZE".to_string(),
                    value: size.clone(),
                })?;
        }

        self.validate()
    }

    /// Checks cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.llm.models.contains_key(BASE_MODEL) {
            return Err(ConfigError::UnknownModel(BASE_MODEL.to_string()));
        }

        if self.pipeline.sample_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "pipeline.sample_size".to_string(),
                value: "0".to_string(),
            });
        }

        Ok(())
    }

    /// Looks up a model in the catalogue.
    pub fn model(&self, name: &str) -> Result<&ModelConfig, ConfigError> {
        self.llm
            .models
            .get(name)
            .ok_or_else(|| ConfigError::UnknownModel(name.to_string()))
    }

    /// Looks up a prompt in the catalogue.
    pub fn prompt(&self, key: &str) -> Result<&PromptConfig, ConfigError> {
        self.prompts
            .get(key)
            .ok_or_else(|| ConfigError::UnknownPrompt(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.pipeline.sample_size, MIN_SAMPLE_SIZE);
        assert!(settings.model(BASE_MODEL).is_ok());
        assert!(settings.prompt(prompt_keys::DATATYPE_NUMERIC).is_ok());
        assert_eq!(settings.llm.options.num_predict, 128);
    }

    #[test]
    fn test_from_yaml_keeps_default_prompts() {
        let yaml = r#"
logging:
  level: debug
llm:
  host: http://ollama:11434
  models:
    base:
      model_id: llama3.2:3b
    large:
      model_id: llama3.1:70b
      url: http://gpu:11434
prompts:
  describe_dataset:
    prompt: "Summarise {data_table}"
pipeline:
  sample_size: 50
"#;
        let settings = Settings::from_yaml_str(yaml).unwrap();

        assert_eq!(settings.logging.level, "debug");
        assert!(!settings.logging.json);
        assert_eq!(settings.llm.host, "http://ollama:11434");
        assert_eq!(settings.llm.options, ChatOptions::default());
        assert_eq!(settings.model("large").unwrap().url.as_deref(), Some("http://gpu:11434"));
        assert_eq!(
            settings.prompt(prompt_keys::DESCRIBE_DATASET).unwrap().prompt,
            "Summarise {data_table}"
        );
        assert!(settings.prompt(prompt_keys::DATATYPE).is_ok());
        assert_eq!(settings.pipeline.sample_size, 50);
    }

    #[test]
    fn test_missing_base_model_rejected() {
        let yaml = r"
llm:
  models:
    other:
      model_id: x
";
        let err = Settings::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownModel(name) if name == "base"));
    }

    #[test]
    fn test_invalid_yaml() {
        let err = Settings::from_yaml_str("logging: [unclosed").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(Settings::from_yaml_str("").unwrap(), Settings::default());
    }

    #[test]
    fn test_from_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "pipeline:\n  sample_size: 10").unwrap();

        let settings = Settings::from_yaml_file(file.path()).unwrap();
        assert_eq!(settings.pipeline.sample_size, 10);
    }

    #[test]
    fn test_from_yaml_file_missing() {
        let err = Settings::from_yaml_file("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_env_overrides() {
        let env = HashMap::from([
            ("DATABY_LOG_LEVEL", "warn"),
            ("DATABY_LOG_JSON", "true"),
            ("OLLAMA_HOST_URL", "http://remote:11434"),
            ("DATABY_SAMPLE_SIZE", "100"),
        ]);
        let mut settings = Settings::default();
        settings
            .apply_env_overrides(|key| env.get(key).map(ToString::to_string))
            .unwrap();

        assert_eq!(settings.logging.level, "warn");
        assert!(settings.logging.json);
        assert_eq!(settings.llm.host, "http://remote:11434");
        assert_eq!(settings.pipeline.sample_size, 100);
    }

    #[test]
    fn test_env_override_rejects_bad_sample_size() {
        let mut settings = Settings::default();
        let err = settings
            .apply_env_overrides(|key| (key == "DATABY_SAMPLE_SIZE").then(|| "lots".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_effective_sample_size_is_clamped() {
        let config = PipelineConfig {
            sample_size: 10_000,
            timeout_secs: None,
        };
        assert_eq!(config.effective_sample_size(), MAX_SAMPLE_SIZE);
    }
}
