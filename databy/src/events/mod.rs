//! Event sinks for the streaming boundary.
//!
//! The chain reports every stage transition through an [`EventSink`] held by
//! the run context. Consumers that only poll `session.agent.state` can ignore
//! events entirely.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// Event names emitted by the pipeline engine.
pub mod names {
    /// A chain run began.
    pub const PIPELINE_STARTED: &str = "pipeline.started";
    /// A chain run finished successfully.
    pub const PIPELINE_COMPLETED: &str = "pipeline.completed";
    /// A chain run aborted.
    pub const PIPELINE_FAILED: &str = "pipeline.failed";
    /// A stage is about to run.
    pub const STAGE_STARTED: &str = "stage.started";
    /// A stage finished and passed its own validation.
    pub const STAGE_COMPLETED: &str = "stage.completed";
    /// A stage raised an error.
    pub const STAGE_FAILED: &str = "stage.failed";
    /// `agent.state` now names a different stage.
    pub const AGENT_STATE_CHANGED: &str = "agent.state_changed";
    /// A registered tool was invoked.
    pub const TOOL_INVOKED: &str = "tool.invoked";
}
