//! Client-facing payloads: the session report and error bodies.

use crate::context::SessionRecord;
use crate::core::DType;
use crate::errors::{DatabyError, StageError, ToolError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

/// The result of a pipeline run as returned to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    /// Session ID.
    pub id: Uuid,
    /// When the session was created.
    pub created_timestamp: DateTime<Utc>,
    /// Dataset-level description.
    pub description: Option<String>,
    /// Original dtype per column.
    pub data_types: Option<BTreeMap<String, DType>>,
    /// The data summary as row objects.
    pub data_summary: Option<Vec<Map<String, Value>>>,
    /// Last stage the agent reached.
    pub agent_state: Option<String>,
    /// Whether the agent is alive.
    pub agent_alive: bool,
    /// Tags supplied with the request.
    pub user_input_tags: Option<Vec<String>>,
    /// Modelling objective supplied with the request.
    pub model_objective: Option<String>,
}

impl From<&SessionRecord> for SessionReport {
    fn from(session: &SessionRecord) -> Self {
        Self {
            id: session.id(),
            created_timestamp: session.created_timestamp(),
            description: session.description.clone(),
            data_types: session.data_types.clone(),
            data_summary: session.data_summary.as_ref().map(|s| s.to_records()),
            agent_state: session.agent.state().map(str::to_string),
            agent_alive: session.agent.is_alive(),
            user_input_tags: session.user_input_tags.clone(),
            model_objective: session.model_objective.clone(),
        }
    }
}

/// An error body with its HTTP status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP status code.
    pub status: u16,
    /// Human readable message.
    pub detail: String,
    /// Machine readable error kind.
    pub kind: String,
}

impl ErrorResponse {
    /// Maps an error onto a status code.
    ///
    /// | error                                   | status |
    /// |-----------------------------------------|--------|
    /// | stage precondition or validation        | 422    |
    /// | bad tool arguments, malformed dataset   | 422    |
    /// | unknown pipeline, workflow or tool      | 404    |
    /// | model call failed                       | 502    |
    /// | deadline exceeded                       | 504    |
    /// | anything else                           | 500    |
    #[must_use]
    pub fn from_error(err: &DatabyError) -> Self {
        Self {
            status: status_for(err),
            detail: err.to_string(),
            kind: err.kind().to_string(),
        }
    }
}

impl From<&DatabyError> for ErrorResponse {
    fn from(err: &DatabyError) -> Self {
        Self::from_error(err)
    }
}

fn status_for(err: &DatabyError) -> u16 {
    match err {
        DatabyError::Stage(StageError::Llm { .. }) | DatabyError::Llm(_) => 502,
        DatabyError::Stage(StageError::Table { .. }) => 500,
        DatabyError::Stage(_) | DatabyError::Table(_) => 422,
        DatabyError::PipelineNotFound(_)
        | DatabyError::Tool(ToolError::NotRegistered { .. } | ToolError::WorkflowNotRegistered { .. }) => 404,
        DatabyError::Tool(ToolError::MissingArgument { .. } | ToolError::InvalidArgument { .. }) => 422,
        DatabyError::Timeout { .. } => 504,
        DatabyError::Tool(ToolError::ExecutionFailed { .. })
        | DatabyError::Validation(_)
        | DatabyError::Config(_)
        | DatabyError::AgentState(_)
        | DatabyError::Serialization(_) => 500,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ConfigError, LlmError, PipelineValidationError, TableError};
    use crate::testing::scenario_a_table;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_status_mapping() {
        let cases: Vec<(DatabyError, u16)> = vec![
            (StageError::precondition("DescribeDataset", "data_summary").into(), 422),
            (
                StageError::MissingColumns {
                    stage: "DataTyperStage".to_string(),
                    missing: vec!["_data_types".to_string()],
                }
                .into(),
                422,
            ),
            (TableError::DuplicateColumn("a".to_string()).into(), 422),
            (DatabyError::PipelineNotFound("nope".to_string()), 404),
            (ToolError::not_registered("w", "t").into(), 404),
            (ToolError::missing_argument("t", "a").into(), 422),
            (StageError::llm("DescribeDataset", LlmError::Transport("down".to_string())).into(), 502),
            (LlmError::Status { status: 500, body: String::new() }.into(), 502),
            (
                DatabyError::Timeout {
                    pipeline: "data_explorer".to_string(),
                    seconds: 1.0,
                },
                504,
            ),
            (PipelineValidationError::new("empty").into(), 500),
            (ConfigError::UnknownModel("huge".to_string()).into(), 500),
        ];

        for (err, status) in cases {
            assert_eq!(ErrorResponse::from_error(&err).status, status, "{err}");
        }
    }

    #[test]
    fn test_error_body() {
        let err: DatabyError = StageError::precondition("DescribeDataset", "data_summary").into();
        let body = ErrorResponse::from(&err);

        assert_eq!(body.kind, "precondition");
        assert_eq!(
            body.detail,
            "DescribeDataset: session data_summary unavailable. Please define data_summary in the session before proceeding to this stage."
        );
    }

    #[test]
    fn test_session_report() {
        let mut session = SessionRecord::new(scenario_a_table()).with_model_objective("predict churn");
        session.agent.set_alive(true);
        session.agent.set_state("DefineDataset");
        session.description = Some("People and places.".to_string());

        let report = SessionReport::from(&session);

        assert_eq!(report.id, session.id());
        assert_eq!(report.agent_state.as_deref(), Some("DefineDataset"));
        assert!(report.agent_alive);
        assert_eq!(report.model_objective.as_deref(), Some("predict churn"));
        assert!(report.data_summary.is_none());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["description"], "People and places.");
    }
}
