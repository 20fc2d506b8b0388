//! The per-request session record.

use super::AgentStatus;
use crate::core::{DType, DataTable};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// The mutable record threaded through every stage of a pipeline run.
///
/// Derived fields start as `None` and are each populated by exactly one
/// stage. A session belongs to one request and is dropped when the run ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    id: Uuid,
    created_timestamp: DateTime<Utc>,
    /// The raw dataset.
    pub data: Option<DataTable>,
    /// Free-form tags supplied with the request.
    pub user_input_tags: Option<Vec<String>>,
    /// What the user wants a model trained on this data to do.
    pub model_objective: Option<String>,
    /// Original dtype per column, written by `DefineDataset`.
    pub data_types: Option<BTreeMap<String, DType>>,
    /// Per-column profile, written by `DefineDataset` and extended later.
    pub data_summary: Option<DataTable>,
    /// Dataset-level narrative, written by `DescribeDataset`.
    pub description: Option<String>,
    /// Heart monitor for the agent running this session.
    pub agent: AgentStatus,
}

impl Default for SessionRecord {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_timestamp: Utc::now(),
            data: None,
            user_input_tags: None,
            model_objective: None,
            data_types: None,
            data_summary: None,
            description: None,
            agent: AgentStatus::new(),
        }
    }
}

impl SessionRecord {
    /// Creates a session for the given dataset.
    #[must_use]
    pub fn new(data: DataTable) -> Self {
        Self {
            data: Some(data),
            ..Self::default()
        }
    }

    /// Creates a session with no dataset.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Sets the user tags.
    #[must_use]
    pub fn with_user_input_tags(mut self, tags: Vec<String>) -> Self {
        self.user_input_tags = Some(tags);
        self
    }

    /// Sets the model objective.
    #[must_use]
    pub fn with_model_objective(mut self, objective: impl Into<String>) -> Self {
        self.model_objective = Some(objective.into());
        self
    }

    /// Returns the session id.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns when the session was created.
    #[must_use]
    pub fn created_timestamp(&self) -> DateTime<Utc> {
        self.created_timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Column;

    #[test]
    fn test_new_session_has_no_derived_fields() {
        let table = DataTable::from_columns(vec![Column::from_values("a", [1_i64])]).unwrap();
        let session = SessionRecord::new(table);

        assert!(session.data.is_some());
        assert!(session.data_types.is_none());
        assert!(session.data_summary.is_none());
        assert!(session.description.is_none());
        assert_eq!(session.agent.state(), None);
    }

    #[test]
    fn test_sessions_have_distinct_ids() {
        assert_ne!(SessionRecord::empty().id(), SessionRecord::empty().id());
    }

    #[test]
    fn test_request_inputs() {
        let session = SessionRecord::empty()
            .with_user_input_tags(vec!["churn".to_string()])
            .with_model_objective("predict churn");

        assert_eq!(session.user_input_tags.as_deref(), Some(&["churn".to_string()][..]));
        assert_eq!(session.model_objective.as_deref(), Some("predict churn"));
    }
}
