//! Stage trait and the data explorer stages.
//!
//! A stage owns one transformation of the session. The chain drives every
//! stage through the same sequence: `check_input`, `forward`,
//! `validate_output`. A stage never repairs a session it finds broken.

mod data_typer;
mod define_dataset;
mod describe_dataset;
pub mod schema;

pub use data_typer::DataTyperStage;
pub use define_dataset::{build_data_summary, DefineDataset};
pub use describe_dataset::DescribeDataset;

use crate::context::{RunContext, SessionRecord};
use crate::errors::StageError;
use async_trait::async_trait;
use std::fmt::Debug;

/// A unit of pipeline work.
///
/// Stages keep no per-run state on `self`, so one instance can serve many
/// sessions concurrently.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// Returns the name published to `agent.state`.
    fn name(&self) -> &str;

    /// Checks the fields this stage needs. Must not mutate the session.
    fn check_input(&self, _session: &SessionRecord) -> Result<(), StageError> {
        Ok(())
    }

    /// Performs the stage's transformation in place.
    async fn forward(&self, ctx: &RunContext, session: &mut SessionRecord) -> Result<(), StageError>;

    /// Checks the fields this stage is responsible for. Must not mutate the
    /// session.
    fn validate_output(&self, session: &SessionRecord) -> Result<(), StageError>;
}

/// A stage backed by a synchronous closure. Its output is never validated.
pub struct FnStage<F>
where
    F: Fn(&mut SessionRecord) -> Result<(), StageError> + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnStage<F>
where
    F: Fn(&mut SessionRecord) -> Result<(), StageError> + Send + Sync,
{
    /// Creates a new closure stage.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for FnStage<F>
where
    F: Fn(&mut SessionRecord) -> Result<(), StageError> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStage").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F> Stage for FnStage<F>
where
    F: Fn(&mut SessionRecord) -> Result<(), StageError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn forward(&self, _ctx: &RunContext, session: &mut SessionRecord) -> Result<(), StageError> {
        (self.func)(session)
    }

    fn validate_output(&self, _session: &SessionRecord) -> Result<(), StageError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockChatClient;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_fn_stage() {
        let stage = FnStage::new("Tagger", |session: &mut SessionRecord| {
            session.model_objective = Some("classification".to_string());
            Ok(())
        });
        let ctx = RunContext::new(Arc::new(MockChatClient::echo()));
        let mut session = SessionRecord::empty();

        assert_eq!(stage.name(), "Tagger");
        stage.forward(&ctx, &mut session).await.unwrap();
        assert_eq!(session.model_objective.as_deref(), Some("classification"));
        assert!(stage.validate_output(&session).is_ok());
    }
}
