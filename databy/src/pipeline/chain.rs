//! Ordered stage chains.

use crate::context::{RunContext, SessionRecord};
use crate::errors::{ContractErrorInfo, DatabyError, PipelineValidationError, StageError};
use crate::events::names;
use crate::observability::{StageSpanAttributes, StageTimer};
use crate::stages::Stage;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Fluent builder for a [`Chain`].
///
/// ```rust,ignore
/// let chain = ChainBuilder::new("data_explorer", Arc::new(DefineDataset::new()))
///     .set_next(Arc::new(DescribeDataset::new(&settings)?))
///     .set_next(Arc::new(DataTyperStage::new(&settings)?))
///     .build()?;
/// ```
#[derive(Debug, Clone)]
pub struct ChainBuilder {
    name: String,
    stages: Vec<Arc<dyn Stage>>,
}

impl ChainBuilder {
    /// Starts a chain at `head`.
    #[must_use]
    pub fn new(name: impl Into<String>, head: Arc<dyn Stage>) -> Self {
        Self {
            name: name.into(),
            stages: vec![head],
        }
    }

    /// Starts a chain from an ordered list of stages.
    #[must_use]
    pub fn from_stages(name: impl Into<String>, stages: Vec<Arc<dyn Stage>>) -> Self {
        Self {
            name: name.into(),
            stages,
        }
    }

    /// Appends `stage` after the current tail.
    #[must_use]
    pub fn set_next(mut self, stage: Arc<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Validates and builds the chain.
    ///
    /// # Errors
    ///
    /// Returns an error if the chain is empty or two stages share a name.
    pub fn build(self) -> Result<Chain, PipelineValidationError> {
        if self.stages.is_empty() {
            return Err(PipelineValidationError::new(format!(
                "Chain '{}' has no stages",
                self.name
            ))
            .with_error_info(
                ContractErrorInfo::new("CONTRACT-001-EMPTY", "Cannot build an empty chain")
                    .with_fix_hint("Start the chain with a head stage."),
            ));
        }

        let mut seen = HashSet::new();
        for stage in &self.stages {
            if !seen.insert(stage.name()) {
                return Err(PipelineValidationError::new(format!(
                    "Stage '{}' appears more than once in chain '{}'",
                    stage.name(),
                    self.name
                ))
                .with_stages(vec![stage.name().to_string()])
                .with_error_info(
                    ContractErrorInfo::new(
                        "CONTRACT-002-DUPLICATE_STAGE",
                        format!("Duplicate stage '{}'", stage.name()),
                    )
                    .with_fix_hint("Every stage in a chain is visited once; give each a unique name."),
                ));
            }
        }

        Ok(Chain {
            name: self.name,
            stages: self.stages,
        })
    }
}

/// An immutable, ordered list of stages run against one session at a time.
///
/// A chain holds no per-run state, so one instance can be shared across
/// concurrent sessions through an `Arc`.
#[derive(Debug, Clone)]
pub struct Chain {
    name: String,
    stages: Vec<Arc<dyn Stage>>,
}

impl Chain {
    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the stage names in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<String> {
        self.stages.iter().map(|s| s.name().to_string()).collect()
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Always false: empty chains cannot be built.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Returns the stage at `index`.
    #[must_use]
    pub fn stage(&self, index: usize) -> Option<&Arc<dyn Stage>> {
        self.stages.get(index)
    }

    /// Runs every stage in order, starting at the head.
    ///
    /// # Errors
    ///
    /// Returns the first stage error. `session.agent.state` then names the
    /// stage that failed.
    pub async fn run(&self, ctx: &RunContext, session: &mut SessionRecord) -> Result<(), DatabyError> {
        info!(pipeline = %self.name, session_id = %session.id(), "starting pipeline");
        ctx.emit(
            names::PIPELINE_STARTED,
            json!({"pipeline": self.name, "session_id": session.id().to_string()}),
        )
        .await;

        let result = self.forward_from(0, ctx, session).await;

        match &result {
            Ok(()) => {
                info!(pipeline = %self.name, "pipeline completed");
                ctx.emit(names::PIPELINE_COMPLETED, json!({"pipeline": self.name}))
                    .await;
            }
            Err(err) => {
                ctx.emit(
                    names::PIPELINE_FAILED,
                    json!({"pipeline": self.name, "error": err.to_string()}),
                )
                .await;
            }
        }

        result
    }

    /// Runs the tail of the chain starting at `start`.
    ///
    /// Each stage runs `check_input`, `forward` and `validate_output`; only
    /// after its own validation passes is `agent.state` advanced to the
    /// successor. The terminal stage leaves the state untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if `start` is out of range or any stage fails.
    pub async fn forward_from(
        &self,
        start: usize,
        ctx: &RunContext,
        session: &mut SessionRecord,
    ) -> Result<(), DatabyError> {
        let Some(first) = self.stages.get(start) else {
            return Err(PipelineValidationError::new(format!(
                "Chain '{}' has {} stages; cannot start at index {start}",
                self.name,
                self.stages.len()
            ))
            .into());
        };

        if !session.agent.is_alive() {
            session.agent.set_alive(true);
        }
        self.publish_state(ctx, session, first.name()).await;

        for (index, stage) in self.stages.iter().enumerate().skip(start) {
            let attrs = StageSpanAttributes::new(&self.name, stage.name(), index);
            ctx.emit(names::STAGE_STARTED, attrs.to_payload()).await;
            let timer = StageTimer::start(stage.name());

            if let Err(err) = execute_stage(stage.as_ref(), ctx, session).await {
                let attrs = attrs
                    .with_duration_ms(timer.finish())
                    .with_error(err.to_string());
                warn!(pipeline = %self.name, stage = stage.name(), error = %err, "stage failed");
                ctx.emit(names::STAGE_FAILED, attrs.to_payload()).await;
                return Err(err.into());
            }

            let duration_ms = timer.finish();
            debug!(pipeline = %self.name, stage = stage.name(), duration_ms, "stage completed");
            ctx.emit(
                names::STAGE_COMPLETED,
                attrs.with_duration_ms(duration_ms).to_payload(),
            )
            .await;

            if let Some(next) = self.stages.get(index + 1) {
                self.publish_state(ctx, session, next.name()).await;
            }
        }

        Ok(())
    }

    async fn publish_state(&self, ctx: &RunContext, session: &mut SessionRecord, state: &str) {
        session.agent.set_state(state);
        info!(pipeline = %self.name, state, "agent state updated");
        ctx.emit(
            names::AGENT_STATE_CHANGED,
            json!({
                "pipeline": self.name,
                "session_id": session.id().to_string(),
                "state": state,
            }),
        )
        .await;
    }
}

async fn execute_stage(
    stage: &dyn Stage,
    ctx: &RunContext,
    session: &mut SessionRecord,
) -> Result<(), StageError> {
    stage.check_input(session)?;
    stage.forward(ctx, session).await?;
    stage.validate_output(session)
}
