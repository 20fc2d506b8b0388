//! Timing helpers for stage execution.

use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Attributes recorded for one stage execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageSpanAttributes {
    /// Pipeline name.
    pub pipeline: String,
    /// Stage name.
    pub stage: String,
    /// Position of the stage in its chain.
    pub index: usize,
    /// Duration in milliseconds.
    pub duration_ms: Option<f64>,
    /// Error message if the stage failed.
    pub error: Option<String>,
}

impl StageSpanAttributes {
    /// Creates attributes for a stage about to run.
    #[must_use]
    pub fn new(pipeline: impl Into<String>, stage: impl Into<String>, index: usize) -> Self {
        Self {
            pipeline: pipeline.into(),
            stage: stage.into(),
            index,
            ..Default::default()
        }
    }

    /// Sets the duration.
    #[must_use]
    pub fn with_duration_ms(mut self, duration_ms: f64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Sets the error.
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Converts the attributes into an event payload.
    #[must_use]
    pub fn to_payload(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Measures how long a stage took.
#[derive(Debug)]
pub struct StageTimer {
    start: Instant,
    name: String,
}

impl StageTimer {
    /// Starts a new timer.
    #[must_use]
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            name: name.into(),
        }
    }

    /// Returns the elapsed time in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    /// Returns the timed stage name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stops the timer and returns the duration in milliseconds.
    #[must_use]
    pub fn finish(self) -> f64 {
        self.elapsed_ms()
    }
}
