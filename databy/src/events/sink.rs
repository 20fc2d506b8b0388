//! Event sink trait and implementations.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info, warn, Level};

/// Receives pipeline events.
///
/// Sinks must never fail the pipeline: delivery problems are logged and
/// dropped.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Emits an event.
    ///
    /// # Arguments
    ///
    /// * `event_type` - The type of event (see [`crate::events::names`])
    /// * `data` - Optional event payload
    async fn emit(&self, event_type: &str, data: Option<Value>);

    /// Emits an event from synchronous code.
    fn try_emit(&self, event_type: &str, data: Option<Value>);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _event_type: &str, _data: Option<Value>) {}

    fn try_emit(&self, _event_type: &str, _data: Option<Value>) {}
}

/// Forwards events to `tracing`.
///
/// Failure events are always logged at `WARN`; everything else uses the
/// configured level.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a sink logging at the given level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }

    fn log_event(&self, event_type: &str, data: Option<&Value>) {
        let field = |key: &str| {
            data.and_then(|d| d.get(key))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let pipeline = field("pipeline");
        let stage = field("stage");

        if event_type.ends_with(".failed") {
            warn!(event_type, %pipeline, %stage, event_data = ?data, "pipeline event");
        } else if self.level == Level::DEBUG {
            debug!(event_type, %pipeline, %stage, event_data = ?data, "pipeline event");
        } else {
            info!(event_type, %pipeline, %stage, "pipeline event");
        }
    }
}

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn emit(&self, event_type: &str, data: Option<Value>) {
        self.log_event(event_type, data.as_ref());
    }

    fn try_emit(&self, event_type: &str, data: Option<Value>) {
        self.log_event(event_type, data.as_ref());
    }
}

/// Keeps every event in memory. Used by tests and by callers that replay a
/// run's progress after the fact.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: RwLock<Vec<(String, Option<Value>)>>,
}

impl CollectingEventSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<(String, Option<Value>)> {
        self.events.read().clone()
    }

    /// Returns the collected event names in order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.events.read().iter().map(|(name, _)| name.clone()).collect()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if nothing has been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Returns events whose name starts with `prefix`.
    #[must_use]
    pub fn events_of_type(&self, prefix: &str) -> Vec<(String, Option<Value>)> {
        self.events
            .read()
            .iter()
            .filter(|(name, _)| name.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Returns the sequence of `state` values published by
    /// `agent.state_changed` events.
    #[must_use]
    pub fn state_transitions(&self) -> Vec<String> {
        self.events
            .read()
            .iter()
            .filter(|(name, _)| name == super::names::AGENT_STATE_CHANGED)
            .filter_map(|(_, data)| {
                data.as_ref()
                    .and_then(|d| d.get("state"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .collect()
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn emit(&self, event_type: &str, data: Option<Value>) {
        self.try_emit(event_type, data);
    }

    fn try_emit(&self, event_type: &str, data: Option<Value>) {
        self.events.write().push((event_type.to_string(), data));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::names;
    use serde_json::json;

    #[tokio::test]
    async fn test_noop_sink() {
        let sink = NoOpEventSink;
        sink.emit(names::STAGE_STARTED, None).await;
        sink.try_emit(names::STAGE_COMPLETED, Some(json!({"stage": "DefineDataset"})));
    }

    #[tokio::test]
    async fn test_logging_sink() {
        let sink = LoggingEventSink::debug();
        sink.emit(names::STAGE_FAILED, Some(json!({"stage": "DescribeDataset"})))
            .await;
        sink.try_emit(names::PIPELINE_STARTED, None);
    }

    #[tokio::test]
    async fn test_collecting_sink_filters_by_prefix() {
        let sink = CollectingEventSink::new();
        assert!(sink.is_empty());

        sink.emit(names::STAGE_STARTED, None).await;
        sink.emit(names::STAGE_COMPLETED, None).await;
        sink.try_emit(names::TOOL_INVOKED, None);

        assert_eq!(sink.len(), 3);
        assert_eq!(sink.events_of_type("stage.").len(), 2);
        assert_eq!(sink.names()[2], names::TOOL_INVOKED);
    }

    #[tokio::test]
    async fn test_state_transitions() {
        let sink = CollectingEventSink::new();
        sink.emit(names::AGENT_STATE_CHANGED, Some(json!({"state": "DefineDataset"})))
            .await;
        sink.emit(names::STAGE_COMPLETED, Some(json!({"state": "ignored"})))
            .await;
        sink.emit(names::AGENT_STATE_CHANGED, Some(json!({"state": "DescribeDataset"})))
            .await;

        assert_eq!(sink.state_transitions(), vec!["DefineDataset", "DescribeDataset"]);
    }
}
