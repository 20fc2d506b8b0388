//! Third stage: classify column types.

use super::schema::{DATA_SUMMARY_TYPE_COLS, FIELD_NAME};
use super::Stage;
use crate::config::Settings;
use crate::context::{RunContext, SessionRecord};
use crate::core::Column;
use crate::errors::{ConfigError, StageError, TableError};
use crate::llm::DataTyper;
use async_trait::async_trait;
use tracing::info;

/// Adds `_data_types` and `_data_num_types` to `data_summary`.
#[derive(Debug)]
pub struct DataTyperStage {
    typer: DataTyper,
    sample_size: usize,
}

impl DataTyperStage {
    /// Name published to `agent.state`.
    pub const NAME: &'static str = "DataTyperStage";

    /// Creates the stage with typers built from `settings`.
    pub fn new(settings: &Settings) -> Result<Self, ConfigError> {
        Ok(Self {
            typer: DataTyper::new(settings)?,
            sample_size: settings.pipeline.effective_sample_size(),
        })
    }
}

#[async_trait]
impl Stage for DataTyperStage {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn check_input(&self, session: &SessionRecord) -> Result<(), StageError> {
        if session.data_summary.is_none() {
            return Err(StageError::precondition(Self::NAME, "data_summary"));
        }
        if session.data.is_none() {
            return Err(StageError::precondition(Self::NAME, "data"));
        }
        Ok(())
    }

    async fn forward(&self, ctx: &RunContext, session: &mut SessionRecord) -> Result<(), StageError> {
        let summary = session
            .data_summary
            .as_ref()
            .ok_or_else(|| StageError::precondition(Self::NAME, "data_summary"))?;
        let data = session
            .data
            .as_ref()
            .ok_or_else(|| StageError::precondition(Self::NAME, "data"))?;
        let keys = summary.column(FIELD_NAME).ok_or_else(|| {
            StageError::table(Self::NAME, TableError::UnknownColumn(FIELD_NAME.to_string()))
        })?;

        let (types, num_types) = self
            .typer
            .classify_columns(ctx.client(), ctx.history(), &data.head(self.sample_size))
            .await
            .map_err(|e| StageError::llm(Self::NAME, e))?;

        let [types_col, num_types_col] = DATA_SUMMARY_TYPE_COLS;
        let mut updated = summary.clone();
        for column in [
            Column::map_from(types_col, keys, &types),
            Column::map_from(num_types_col, keys, &num_types),
        ] {
            updated
                .insert_column(column)
                .map_err(|e| StageError::table(Self::NAME, e))?;
        }

        info!(
            columns = types.len(),
            numeric = num_types.len(),
            "classified column types"
        );
        session.data_summary = Some(updated);
        Ok(())
    }

    fn validate_output(&self, session: &SessionRecord) -> Result<(), StageError> {
        let summary = session
            .data_summary
            .as_ref()
            .ok_or_else(|| StageError::missing_attribute(Self::NAME, "data_summary"))?;

        let missing: Vec<String> = DATA_SUMMARY_TYPE_COLS
            .iter()
            .filter(|c| !summary.contains_column(c))
            .map(ToString::to_string)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(StageError::MissingColumns {
                stage: Self::NAME.to_string(),
                missing,
            })
        }
    }
}
