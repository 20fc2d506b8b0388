//! Stages with scripted behaviour for chain tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use crate::context::{RunContext, SessionRecord};
use crate::errors::{LlmError, StageError};
use crate::stages::Stage;

/// Shared record of which stages ran, in order.
#[derive(Debug, Clone, Default)]
pub struct VisitLog {
    entries: Arc<Mutex<Vec<(String, Option<String>)>>>,
}

impl VisitLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, stage: &str, state: Option<&str>) {
        self.entries
            .lock()
            .push((stage.to_string(), state.map(str::to_string)));
    }

    /// Returns the visited stage names in order.
    #[must_use]
    pub fn visits(&self) -> Vec<String> {
        self.entries.lock().iter().map(|(s, _)| s.clone()).collect()
    }

    /// Returns `agent.state` as each stage saw it when it started.
    #[must_use]
    pub fn observed_states(&self) -> Vec<Option<String>> {
        self.entries.lock().iter().map(|(_, s)| s.clone()).collect()
    }
}

/// A stage that records each visit and can be told to fail its validation.
#[derive(Debug)]
pub struct RecordingStage {
    name: String,
    log: VisitLog,
    fail_validation: bool,
}

impl RecordingStage {
    /// Creates a stage writing to `log`.
    #[must_use]
    pub fn new(name: impl Into<String>, log: &VisitLog) -> Self {
        Self {
            name: name.into(),
            log: log.clone(),
            fail_validation: false,
        }
    }

    /// Makes `validate_output` fail.
    #[must_use]
    pub fn failing_validation(mut self) -> Self {
        self.fail_validation = true;
        self
    }
}

#[async_trait]
impl Stage for RecordingStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn forward(&self, _ctx: &RunContext, session: &mut SessionRecord) -> Result<(), StageError> {
        self.log.record(&self.name, session.agent.state());
        Ok(())
    }

    fn validate_output(&self, _session: &SessionRecord) -> Result<(), StageError> {
        if self.fail_validation {
            return Err(StageError::missing_attribute(&self.name, "output"));
        }
        Ok(())
    }
}

/// A stage whose `forward` always fails with an LLM transport error.
#[derive(Debug)]
pub struct FailingStage {
    name: String,
}

impl FailingStage {
    /// Creates a failing stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Stage for FailingStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn forward(&self, _ctx: &RunContext, _session: &mut SessionRecord) -> Result<(), StageError> {
        Err(StageError::llm(
            &self.name,
            LlmError::Transport("model server unreachable".to_string()),
        ))
    }

    fn validate_output(&self, _session: &SessionRecord) -> Result<(), StageError> {
        Ok(())
    }
}

/// A stage that sleeps before succeeding.
#[derive(Debug)]
pub struct SlowStage {
    name: String,
    delay: Duration,
}

impl SlowStage {
    /// Creates a stage sleeping for `delay`.
    #[must_use]
    pub fn new(name: impl Into<String>, delay: Duration) -> Self {
        Self {
            name: name.into(),
            delay,
        }
    }
}

#[async_trait]
impl Stage for SlowStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn forward(&self, _ctx: &RunContext, _session: &mut SessionRecord) -> Result<(), StageError> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }

    fn validate_output(&self, _session: &SessionRecord) -> Result<(), StageError> {
        Ok(())
    }
}
