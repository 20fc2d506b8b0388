//! The model callers used by the data explorer stages.

use super::{prompt_args, CallHistory, ChatClient, ChatResponse, Instruct, PromptArgs, Spine};
use crate::config::{prompt_keys, Settings};
use crate::core::DataTable;
use crate::errors::{ConfigError, LlmError};
use std::collections::HashMap;
use tracing::debug;

/// Numeric subtypes accepted from [`NumericTyper`].
pub const NUMERIC_SUBTYPES: [&str; 5] = ["continuous", "binary", "multi", "ordinal", "nominal"];

fn reject_unknown(function: &str, kwargs: &PromptArgs, accepted: &[&str]) -> Result<(), LlmError> {
    match kwargs.keys().find(|k| !accepted.contains(&k.as_str())) {
        Some(key) => Err(LlmError::UnexpectedArgument {
            function: function.to_string(),
            argument: key.clone(),
        }),
        None => Ok(()),
    }
}

/// Writes a dataset-level description from the markdown summary table.
#[derive(Debug)]
pub struct DatasetDescriber {
    spine: Spine,
}

impl DatasetDescriber {
    /// Label recorded in the call history.
    pub const LABEL: &'static str = "DatasetDescriber";

    /// Creates the describer from the `describe_dataset` prompt.
    pub fn new(settings: &Settings) -> Result<Self, ConfigError> {
        Ok(Self {
            spine: Spine::from_prompt_key(Self::LABEL, prompt_keys::DESCRIBE_DATASET, settings)?,
        })
    }

    /// Describes a dataset from its summary table.
    pub async fn describe(
        &self,
        client: &dyn ChatClient,
        history: &CallHistory,
        summary_markdown: &str,
    ) -> Result<String, LlmError> {
        self.run(client, history, prompt_args([("data_summary", summary_markdown)]))
            .await
    }
}

impl Instruct for DatasetDescriber {
    fn spine(&self) -> &Spine {
        &self.spine
    }

    fn pre_process(&self, kwargs: &PromptArgs) -> Result<PromptArgs, LlmError> {
        reject_unknown(Self::LABEL, kwargs, &["data_summary"])?;
        let summary = kwargs.get("data_summary").ok_or_else(|| LlmError::MissingArgument {
            function: Self::LABEL.to_string(),
            argument: "data_summary".to_string(),
        })?;
        Ok(prompt_args([("data_table", summary.as_str())]))
    }
}

/// Writes a one-line description for each column.
#[derive(Debug)]
pub struct ColumnDescriber {
    spine: Spine,
}

impl ColumnDescriber {
    /// Label recorded in the call history.
    pub const LABEL: &'static str = "ColumnDescriber";

    /// Creates the describer from the `dataset_meta_description` prompt.
    pub fn new(settings: &Settings) -> Result<Self, ConfigError> {
        Ok(Self {
            spine: Spine::from_prompt_key(
                Self::LABEL,
                prompt_keys::DATASET_META_DESCRIPTION,
                settings,
            )?,
        })
    }

    /// Describes every column of `sample`, one call per column, in column order.
    pub async fn describe_columns(
        &self,
        client: &dyn ChatClient,
        history: &CallHistory,
        description: &str,
        sample: &DataTable,
    ) -> Result<HashMap<String, String>, LlmError> {
        let mut meta = HashMap::with_capacity(sample.column_count());
        for column in sample.columns() {
            debug!(column = column.name(), "describing column");
            let inputs = prompt_args([
                ("data_description", description.to_string()),
                ("data_label", column.name().to_string()),
                ("data_samples", column.to_markdown()),
            ]);
            meta.insert(column.name().to_string(), self.run(client, history, inputs).await?);
        }
        Ok(meta)
    }
}

impl Instruct for ColumnDescriber {
    fn spine(&self) -> &Spine {
        &self.spine
    }

    fn pre_process(&self, kwargs: &PromptArgs) -> Result<PromptArgs, LlmError> {
        reject_unknown(
            Self::LABEL,
            kwargs,
            &["data_description", "data_samples", "data_sample", "data_label"],
        )?;

        let get = |key: &str| kwargs.get(key).cloned().unwrap_or_default();
        let samples = Some(get("data_samples"))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| get("data_sample"));

        Ok(prompt_args([
            ("data_description", get("data_description")),
            ("data_samples", samples),
            ("data_label", get("data_label")),
        ]))
    }
}

/// Classifies a column's numeric semantics.
#[derive(Debug)]
pub struct NumericTyper {
    spine: Spine,
}

impl NumericTyper {
    /// Label recorded in the call history.
    pub const LABEL: &'static str = "NumericTyper";

    /// Creates the typer from the `datatype_numeric` prompt.
    pub fn new(settings: &Settings) -> Result<Self, ConfigError> {
        Ok(Self {
            spine: Spine::from_prompt_key(Self::LABEL, prompt_keys::DATATYPE_NUMERIC, settings)?,
        })
    }
}

impl Instruct for NumericTyper {
    fn spine(&self) -> &Spine {
        &self.spine
    }

    fn pre_process(&self, kwargs: &PromptArgs) -> Result<PromptArgs, LlmError> {
        Ok(kwargs.clone())
    }

    /// Accepts only [`NUMERIC_SUBTYPES`], case-insensitively. The common
    /// misspelling `continous` is normalised.
    fn post_process(&self, response: &ChatResponse) -> Result<String, LlmError> {
        let answer = response.content().trim().to_lowercase();
        let answer = if answer == "continous" {
            "continuous".to_string()
        } else {
            answer
        };

        if NUMERIC_SUBTYPES.contains(&answer.as_str()) {
            Ok(answer)
        } else {
            Err(LlmError::InvalidResponse {
                function: Self::LABEL.to_string(),
                response: response.content().to_string(),
            })
        }
    }
}

/// Classifies each column's broad type, and numeric columns' subtype.
#[derive(Debug)]
pub struct DataTyper {
    spine: Spine,
    numeric: NumericTyper,
}

impl DataTyper {
    /// Label recorded in the call history.
    pub const LABEL: &'static str = "DataTyper";

    /// Creates the typer from the `datatype` and `datatype_numeric` prompts.
    pub fn new(settings: &Settings) -> Result<Self, ConfigError> {
        Ok(Self {
            spine: Spine::from_prompt_key(Self::LABEL, prompt_keys::DATATYPE, settings)?,
            numeric: NumericTyper::new(settings)?,
        })
    }

    /// Classifies every column of `sample` in column order.
    ///
    /// Returns the broad type per column and, for columns typed `numeric`,
    /// the numeric subtype.
    pub async fn classify_columns(
        &self,
        client: &dyn ChatClient,
        history: &CallHistory,
        sample: &DataTable,
    ) -> Result<(HashMap<String, String>, HashMap<String, String>), LlmError> {
        let mut types = HashMap::with_capacity(sample.column_count());
        let mut num_types = HashMap::new();

        for column in sample.columns() {
            let inputs = prompt_args([
                ("data_label", column.name().to_string()),
                ("data_samples", column.to_markdown()),
            ]);

            let broad = self.run(client, history, inputs.clone()).await?;
            debug!(column = column.name(), data_type = %broad, "classified column");

            if broad.eq_ignore_ascii_case("numeric") {
                let subtype = self.numeric.run(client, history, inputs).await?;
                num_types.insert(column.name().to_string(), subtype);
            }
            types.insert(column.name().to_string(), broad);
        }

        Ok((types, num_types))
    }
}

impl Instruct for DataTyper {
    fn spine(&self) -> &Spine {
        &self.spine
    }

    fn pre_process(&self, kwargs: &PromptArgs) -> Result<PromptArgs, LlmError> {
        Ok(kwargs.clone())
    }
}
