//! End-to-end runs of chains and the data explorer pipeline.

use super::*;
use crate::config::Settings;
use crate::context::SessionRecord;
use crate::core::{Cell, DataTable};
use crate::errors::{DatabyError, LlmError, StageError};
use crate::events::names;
use crate::llm::{ColumnDescriber, DataTyper, DatasetDescriber, MockChatClient, NumericTyper};
use crate::stages::schema::{DATA_SUMMARY_COLS, FIELD_NAME};
use crate::stages::{DataTyperStage, DefineDataset, DescribeDataset, Stage};
use crate::testing::{
    collecting_context, context_with, customers_session, explorer_client, mock_context,
    scenario_a_table, session_snapshot, FailingStage, RecordingStage, VisitLog,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn recording_chain(log: &VisitLog) -> Chain {
    ChainBuilder::new("abc", Arc::new(RecordingStage::new("A", log)))
        .set_next(Arc::new(RecordingStage::new("B", log)))
        .set_next(Arc::new(RecordingStage::new("C", log)))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_chain_visits_each_stage_once_in_order() {
    let log = VisitLog::new();
    let chain = recording_chain(&log);
    let mut session = SessionRecord::empty();

    chain.run(&mock_context(), &mut session).await.unwrap();

    assert_eq!(log.visits(), vec!["A", "B", "C"]);
}

#[tokio::test]
async fn test_state_names_stage_about_to_run() {
    let log = VisitLog::new();
    let chain = recording_chain(&log);
    let (ctx, sink) = collecting_context(MockChatClient::echo());
    let mut session = SessionRecord::empty();

    chain.run(&ctx, &mut session).await.unwrap();

    let seen: Vec<Option<String>> = ["A", "B", "C"].iter().map(|s| Some((*s).to_string())).collect();
    assert_eq!(log.observed_states(), seen);
    assert_eq!(sink.state_transitions(), vec!["A", "B", "C"]);
    assert_eq!(session.agent.state(), Some("C"));
}

#[tokio::test]
async fn test_validation_failure_stops_chain() {
    let log = VisitLog::new();
    let chain = ChainBuilder::new("abc", Arc::new(RecordingStage::new("A", &log)))
        .set_next(Arc::new(RecordingStage::new("B", &log).failing_validation()))
        .set_next(Arc::new(RecordingStage::new("C", &log)))
        .build()
        .unwrap();
    let (ctx, sink) = collecting_context(MockChatClient::echo());
    let mut session = SessionRecord::empty();

    let err = chain.run(&ctx, &mut session).await.unwrap_err();

    assert!(matches!(
        err,
        DatabyError::Stage(StageError::MissingAttribute { ref stage, .. }) if stage == "B"
    ));
    assert_eq!(log.visits(), vec!["A", "B"]);
    assert_eq!(session.agent.state(), Some("B"));
    assert_eq!(sink.events_of_type(names::STAGE_FAILED).len(), 1);
    assert_eq!(sink.events_of_type(names::PIPELINE_FAILED).len(), 1);
    assert!(sink.events_of_type(names::PIPELINE_COMPLETED).is_empty());
}

#[tokio::test]
async fn test_forward_error_propagates_unchanged() {
    let chain = ChainBuilder::new("broken", Arc::new(FailingStage::new("Remote")))
        .build()
        .unwrap();
    let mut session = SessionRecord::empty();

    let err = chain.run(&mock_context(), &mut session).await.unwrap_err();

    assert_eq!(err.kind(), "llm");
    assert!(err.to_string().contains("model server unreachable"));
}

#[tokio::test]
async fn test_define_dataset_profiles_scenario_table() {
    let stage = DefineDataset::new();
    let mut session = SessionRecord::new(scenario_a_table());

    stage.forward(&mock_context(), &mut session).await.unwrap();
    stage.validate_output(&session).unwrap();

    let summary = session.data_summary.as_ref().unwrap();
    assert_eq!(summary.column_names(), DATA_SUMMARY_COLS.to_vec());
    assert_eq!(summary.row_count(), 2);
    for row in 0..2 {
        assert_eq!(summary.column("missing_count").unwrap().values()[row], Cell::Int(1));
        assert_eq!(summary.column("missing_ratio").unwrap().values()[row], Cell::Float(33.33333));
        assert_eq!(summary.column("unique_count").unwrap().values()[row], Cell::Int(2));
    }
}

#[tokio::test]
async fn test_every_stage_refuses_before_mutating() {
    let settings = Settings::default();
    let stages: Vec<Arc<dyn Stage>> = vec![
        Arc::new(DefineDataset::new()),
        Arc::new(DescribeDataset::new(&settings).unwrap()),
        Arc::new(DataTyperStage::new(&settings).unwrap()),
    ];

    for stage in stages {
        let client = MockChatClient::echo();
        let ctx = context_with(client);
        let mut session = SessionRecord::empty();
        let before = session_snapshot(&session);

        let err = stage.forward(&ctx, &mut session).await.unwrap_err();

        assert!(matches!(err, StageError::Precondition { .. }), "{}: {err}", stage.name());
        assert_eq!(session_snapshot(&session), before, "{} mutated the session", stage.name());
    }
}

#[tokio::test]
async fn test_describe_dataset_on_zero_column_source() {
    let settings = Settings::default();
    let ctx = context_with(explorer_client());
    let mut session = SessionRecord::new(DataTable::new());

    DefineDataset::new().forward(&ctx, &mut session).await.unwrap();
    let describe = DescribeDataset::new(&settings).unwrap();
    describe.forward(&ctx, &mut session).await.unwrap();
    describe.validate_output(&session).unwrap();

    let summary = session.data_summary.as_ref().unwrap();
    assert!(summary.contains_column("description"));
    assert_eq!(summary.row_count(), 0);
    assert!(session.description.is_some());
}

#[tokio::test]
async fn test_data_explorer_end_to_end() {
    let settings = Settings::default();
    let registry = PipelineRegistry::with_defaults(&settings).unwrap();
    let (ctx, sink) = collecting_context(explorer_client());

    let session = run_pipeline(&registry, DATA_EXPLORER, &ctx, customers_session(), None)
        .await
        .unwrap();

    assert_eq!(
        sink.state_transitions(),
        vec![DefineDataset::NAME, DescribeDataset::NAME, DataTyperStage::NAME]
    );
    assert_eq!(session.agent.state(), Some(DataTyperStage::NAME));
    assert_eq!(
        session.description.as_deref(),
        Some("A dataset of records profiled column by column.")
    );

    let summary = session.data_summary.as_ref().unwrap();
    assert_eq!(
        summary.column_names(),
        vec![
            FIELD_NAME,
            "data_type",
            "missing_count",
            "missing_ratio",
            "unique_count",
            "description",
            "_data_types",
            "_data_num_types",
        ]
    );

    let fields = summary.column(FIELD_NAME).unwrap().values();
    let types = summary.column("_data_types").unwrap().values();
    let num_types = summary.column("_data_num_types").unwrap().values();
    let lookup = |name: &str| fields.iter().position(|c| *c == Cell::from(name)).unwrap();

    assert_eq!(types[lookup("city")], Cell::from("categorical"));
    assert_eq!(types[lookup("age")], Cell::from("numeric"));
    assert_eq!(num_types[lookup("age")], Cell::from("continuous"));
    assert_eq!(num_types[lookup("city")], Cell::Null);
    assert!(summary
        .column("description")
        .unwrap()
        .values()
        .iter()
        .all(|c| *c == Cell::from("A field of the dataset.")));

    assert_eq!(sink.events_of_type(names::STAGE_COMPLETED).len(), 3);
    assert_eq!(sink.events_of_type(names::PIPELINE_COMPLETED).len(), 1);
}

#[tokio::test]
async fn test_registry_chain_keeps_histories_per_run() {
    let registry = PipelineRegistry::with_defaults(&Settings::default()).unwrap();
    let first = context_with(explorer_client());
    let second = context_with(explorer_client());

    run_pipeline(&registry, DATA_EXPLORER, &first, customers_session(), None)
        .await
        .unwrap();
    run_pipeline(&registry, DATA_EXPLORER, &second, customers_session(), None)
        .await
        .unwrap();

    // 7 columns, 4 of them numeric: 1 + 7 descriptions, 7 + 4 type calls.
    for ctx in [&first, &second] {
        let history = ctx.history();
        assert_eq!(history.len(), 19);
        assert_eq!(history.for_function(DatasetDescriber::LABEL).len(), 1);
        assert_eq!(history.for_function(ColumnDescriber::LABEL).len(), 7);
        assert_eq!(history.for_function(DataTyper::LABEL).len(), 7);
        assert_eq!(history.for_function(NumericTyper::LABEL).len(), 4);
    }
}

#[tokio::test]
async fn test_summary_rows_follow_source_column_order() {
    let data = DataTable::from_json_columns(&serde_json::json!({
        "zeta": [1, 2],
        "alpha": ["a", null],
        "mid": [true, false],
    }))
    .unwrap();
    let chain = data_explorer_chain(&Settings::default()).unwrap();
    let ctx = context_with(explorer_client());
    let mut session = SessionRecord::new(data);

    chain.run(&ctx, &mut session).await.unwrap();

    let summary = session.data_summary.as_ref().unwrap();
    assert_eq!(
        summary.column(FIELD_NAME).unwrap().values(),
        &[Cell::from("zeta"), Cell::from("alpha"), Cell::from("mid")]
    );
    let described: Vec<String> = ctx
        .history()
        .for_function(ColumnDescriber::LABEL)
        .iter()
        .map(|entry| entry.input.raw_input["data_label"].clone())
        .collect();
    assert_eq!(described, vec!["zeta", "alpha", "mid"]);
}

#[tokio::test]
async fn test_data_explorer_failure_leaves_state_at_failed_stage() {
    let settings = Settings::default();
    let chain = data_explorer_chain(&settings).unwrap();
    let client = MockChatClient::new(vec!["numeric".to_string()])
        .with_pattern("semantic subtype", "somewhere between")
        .with_pattern("summarises every field", "Customers.")
        .with_pattern("Describe what this field contains", "A field.");
    let ctx = context_with(client);
    let mut session = customers_session();

    let err = chain.run(&ctx, &mut session).await.unwrap_err();

    match err {
        DatabyError::Stage(StageError::Llm { stage, source }) => {
            assert_eq!(stage, DataTyperStage::NAME);
            assert!(matches!(source, LlmError::InvalidResponse { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(session.agent.state(), Some(DataTyperStage::NAME));
    let summary = session.data_summary.as_ref().unwrap();
    assert!(summary.contains_column("description"));
    assert!(!summary.contains_column("_data_types"));
}

#[tokio::test]
async fn test_concurrent_sessions_share_one_chain() {
    let settings = Settings::default();
    let chain = Arc::new(data_explorer_chain(&settings).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let chain = Arc::clone(&chain);
            tokio::spawn(async move {
                let ctx = context_with(explorer_client());
                let mut session = customers_session();
                chain
                    .run(&ctx, &mut session)
                    .await
                    .map(|()| (session, ctx.history().len()))
            })
        })
        .collect();

    for handle in handles {
        let (session, calls) = handle.await.unwrap().unwrap();
        assert_eq!(session.agent.state(), Some(DataTyperStage::NAME));
        assert_eq!(calls, 19);
    }
}
