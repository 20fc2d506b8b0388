//! Second stage: describe the dataset and each of its columns.

use super::schema::{DATA_SUMMARY_COLS, DATA_SUMMARY_NEW_COLS, FIELD_NAME};
use super::Stage;
use crate::config::Settings;
use crate::context::{RunContext, SessionRecord};
use crate::core::{Column, DataTable};
use crate::errors::{ConfigError, StageError, TableError};
use crate::llm::{ColumnDescriber, DatasetDescriber};
use async_trait::async_trait;
use tracing::info;

/// Writes `description` and adds a `description` column to `data_summary`.
#[derive(Debug)]
pub struct DescribeDataset {
    dataset: DatasetDescriber,
    columns: ColumnDescriber,
    sample_size: usize,
}

impl DescribeDataset {
    /// Name published to `agent.state`.
    pub const NAME: &'static str = "DescribeDataset";

    /// Creates the stage with describers built from `settings`.
    pub fn new(settings: &Settings) -> Result<Self, ConfigError> {
        Ok(Self {
            dataset: DatasetDescriber::new(settings)?,
            columns: ColumnDescriber::new(settings)?,
            sample_size: settings.pipeline.effective_sample_size(),
        })
    }
}

#[async_trait]
impl Stage for DescribeDataset {
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

        let description = self
            .dataset
            .describe(ctx.client(), ctx.history(), &summary.to_markdown())
            .await
            .map_err(|e| StageError::llm(Self::NAME, e))?;

        let meta = self
            .columns
            .describe_columns(
                ctx.client(),
                ctx.history(),
                &description,
                &data.head(self.sample_size),
            )
            .await
            .map_err(|e| StageError::llm(Self::NAME, e))?;

        let mut updated = summary.clone();
        updated
            .insert_column(Column::map_from("description", keys, &meta))
            .map_err(|e| StageError::table(Self::NAME, e))?;

        info!(columns = meta.len(), "described dataset");
        session.description = Some(description);
        session.data_summary = Some(updated);
        Ok(())
    }

    fn validate_output(&self, session: &SessionRecord) -> Result<(), StageError> {
        let summary = session
            .data_summary
            .as_ref()
            .ok_or_else(|| StageError::missing_attribute(Self::NAME, "data_summary"))?;

        check_exact_columns(Self::NAME, summary)
    }
}

fn check_exact_columns(stage: &str, summary: &DataTable) -> Result<(), StageError> {
    let expected: Vec<&str> = DATA_SUMMARY_COLS
        .iter()
        .chain(DATA_SUMMARY_NEW_COLS.iter())
        .copied()
        .collect();
    let actual = summary.column_names();

    let missing: Vec<String> = expected
        .iter()
        .filter(|c| !actual.contains(c))
        .map(ToString::to_string)
        .collect();
    let extra: Vec<String> = actual
        .iter()
        .filter(|c| !expected.contains(c))
        .map(ToString::to_string)
        .collect();

    if missing.is_empty() && extra.is_empty() {
        Ok(())
    } else {
        Err(StageError::SchemaMismatch {
            stage: stage.to_string(),
            missing,
            extra,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Cell;
    use crate::stages::DefineDataset;
    use crate::testing::{context_with, mock_context, scenario_a_table, session_snapshot};
    use crate::llm::MockChatClient;
    use pretty_assertions::assert_eq;

    async fn defined_session(table: DataTable) -> SessionRecord {
        let mut session = SessionRecord::new(table);
        DefineDataset.forward(&mock_context(), &mut session).await.unwrap();
        session
    }

    fn stage() -> DescribeDataset {
        DescribeDataset::new(&Settings::default()).unwrap()
    }

    #[tokio::test]
    async fn test_adds_description_column() {
        let mut session = defined_session(scenario_a_table()).await;
        let client = MockChatClient::new(vec![
            "A small customer table.".to_string(),
            "Customer age.".to_string(),
            "Customer city.".to_string(),
        ]);
        let stage = stage();
        let ctx = context_with(client);

        stage.forward(&ctx, &mut session).await.unwrap();

        assert_eq!(session.description.as_deref(), Some("A small customer table."));
        let summary = session.data_summary.as_ref().unwrap();
        assert_eq!(
            summary.column("description").unwrap().values(),
            &[Cell::from("Customer age."), Cell::from("Customer city.")]
        );
        assert!(stage.validate_output(&session).is_ok());
        assert_eq!(ctx.history().for_function(DatasetDescriber::LABEL).len(), 1);
        assert_eq!(ctx.history().for_function(ColumnDescriber::LABEL).len(), 2);
    }

    #[tokio::test]
    async fn test_zero_column_source() {
        let mut session = defined_session(DataTable::new()).await;
        let stage = stage();

        stage.forward(&mock_context(), &mut session).await.unwrap();

        let summary = session.data_summary.as_ref().unwrap();
        assert!(summary.contains_column("description"));
        assert_eq!(summary.row_count(), 0);
        assert!(stage.validate_output(&session).is_ok());
    }

    #[tokio::test]
    async fn test_missing_summary_fails_before_mutation() {
        let mut session = SessionRecord::new(scenario_a_table());
        let before = session_snapshot(&session);

        let err = stage().forward(&mock_context(), &mut session).await.unwrap_err();

        assert!(matches!(err, StageError::Precondition { ref field, .. } if field == "data_summary"));
        assert_eq!(session_snapshot(&session), before);
    }

    #[tokio::test]
    async fn test_missing_data_fails_before_any_model_call() {
        let mut session = defined_session(scenario_a_table()).await;
        session.data = None;
        let before = session_snapshot(&session);
        let stage = stage();

        assert!(matches!(
            stage.check_input(&session),
            Err(StageError::Precondition { ref field, .. }) if field == "data"
        ));
        let ctx = mock_context();
        let err = stage.forward(&ctx, &mut session).await.unwrap_err();

        assert!(matches!(err, StageError::Precondition { ref field, .. } if field == "data"));
        assert!(ctx.history().is_empty());
        assert_eq!(session_snapshot(&session), before);
    }

    #[tokio::test]
    async fn test_failed_column_call_leaves_session_untouched() {
        let mut session = defined_session(scenario_a_table()).await;
        let before = session_snapshot(&session);
        let client = MockChatClient::new(vec!["A table.".to_string()])
            .failing_after(1, crate::errors::LlmError::Transport("reset".to_string()));
        let ctx = context_with(client);

        let err = stage().forward(&ctx, &mut session).await.unwrap_err();

        assert!(matches!(err, StageError::Llm { .. }));
        assert_eq!(ctx.history().len(), 1);
        assert!(session.description.is_none());
        assert_eq!(session_snapshot(&session), before);
    }

    #[tokio::test]
    async fn test_validation_reports_missing_and_extra() {
        let mut session = defined_session(scenario_a_table()).await;
        session
            .data_summary
            .as_mut()
            .unwrap()
            .insert_column(Column::from_values("notes", ["x", "y"]))
            .unwrap();

        let err = stage().validate_output(&session).unwrap_err();
        assert_eq!(
            err.to_string(),
            "DescribeDataset: data summary columns mismatch. Missing: [description], Extra: [notes]"
        );
    }

    #[tokio::test]
    async fn test_llm_failure_is_wrapped_with_stage_name() {
        let mut session = defined_session(scenario_a_table()).await;
        let client = MockChatClient::failing(crate::errors::LlmError::Transport("down".to_string()));

        let err = stage()
            .forward(&context_with(client), &mut session)
            .await
            .unwrap_err();

        assert_eq!(err.stage(), DescribeDataset::NAME);
        assert!(matches!(err, StageError::Llm { .. }));
    }
}
