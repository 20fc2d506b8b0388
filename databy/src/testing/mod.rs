//! Testing utilities: fixture datasets, mock contexts and scripted stages.

mod fixtures;
mod mocks;

pub use fixtures::{
    collecting_context, context_with, customers_session, customers_table, explorer_client,
    mock_context, scenario_a_table, session_snapshot,
};
pub use mocks::{FailingStage, RecordingStage, SlowStage, VisitLog};
