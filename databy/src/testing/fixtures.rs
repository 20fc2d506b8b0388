//! Datasets, contexts and clients shared by the test suites.

use std::sync::Arc;

use crate::context::{RunContext, SessionRecord};
use crate::core::{Column, DataTable};
use crate::events::CollectingEventSink;
use crate::llm::MockChatClient;

/// `{"age": [29, null, 42], "city": ["Sydney", "Perth", null]}`.
#[must_use]
pub fn scenario_a_table() -> DataTable {
    DataTable::from_columns(vec![
        Column::from_values("age", [Some(29_i64), None, Some(42)]),
        Column::from_values("city", [Some("Sydney"), Some("Perth"), None]),
    ])
    .unwrap_or_default()
}

/// A small customer table with a mix of dtypes and missing values.
#[must_use]
pub fn customers_table() -> DataTable {
    DataTable::from_columns(vec![
        Column::from_values("user_id", [1_i64, 2, 3, 4, 5, 6, 7]),
        Column::from_values(
            "name",
            ["Alex", "Sam", "Jo", "Kim", "Lee", "Max", "Ria"],
        ),
        Column::from_values("age", [Some(29_i64), Some(35), None, Some(41), Some(23), None, Some(35)]),
        Column::from_values(
            "city",
            [Some("Sydney"), Some("Perth"), Some("Sydney"), None, Some("Hobart"), Some("Perth"), Some("Darwin")],
        ),
        Column::from_values("purchases", [3_i64, 0, 12, 5, 1, 7, 2]),
        Column::from_values("spend", [Some(120.5), Some(0.0), Some(830.25), None, Some(15.0), Some(410.0), Some(60.75)]),
        Column::from_values("churned", [false, true, false, false, true, false, true]),
    ])
    .unwrap_or_default()
}

/// A session holding [`customers_table`].
#[must_use]
pub fn customers_session() -> SessionRecord {
    SessionRecord::new(customers_table())
}

/// A context whose client echoes the prompt back.
#[must_use]
pub fn mock_context() -> RunContext {
    RunContext::new(Arc::new(MockChatClient::echo()))
}

/// A context using `client`.
#[must_use]
pub fn context_with(client: MockChatClient) -> RunContext {
    RunContext::new(Arc::new(client))
}

/// A context using `client` whose events are collected.
#[must_use]
pub fn collecting_context(client: MockChatClient) -> (RunContext, Arc<CollectingEventSink>) {
    let sink = Arc::new(CollectingEventSink::new());
    let ctx = RunContext::new(Arc::new(client)).with_event_sink(sink.clone());
    (ctx, sink)
}

/// A client that answers every data explorer prompt plausibly.
///
/// Columns whose samples contain digits only are typed `numeric`; the
/// numeric subtype is always `continuous`.
#[must_use]
pub fn explorer_client() -> MockChatClient {
    MockChatClient::new(vec!["numeric".to_string()])
        .with_pattern("semantic subtype", "continuous")
        .with_pattern("summarises every field", "A dataset of records profiled column by column.")
        .with_pattern("Describe what this field contains", "A field of the dataset.")
        .with_pattern("Field name: name", "text")
        .with_pattern("Field name: city", "categorical")
        .with_pattern("Field name: churned", "boolean")
}

/// Serialises a session for before/after comparisons.
#[must_use]
pub fn session_snapshot(session: &SessionRecord) -> serde_json::Value {
    serde_json::to_value(session).unwrap_or_default()
}
