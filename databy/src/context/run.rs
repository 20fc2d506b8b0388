//! Collaborators shared by every stage of one run.

use crate::events::{EventSink, NoOpEventSink};
use crate::llm::{CallHistory, ChatClient};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// What a stage may use besides the session: the chat client, the event
/// sink and the run's model call history. Cheap to clone; clones belong to
/// the same run.
#[derive(Clone)]
pub struct RunContext {
    run_id: Uuid,
    client: Arc<dyn ChatClient>,
    event_sink: Arc<dyn EventSink>,
    history: CallHistory,
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("run_id", &self.run_id)
            .field("calls", &self.history.len())
            .finish_non_exhaustive()
    }
}

impl RunContext {
    /// Creates a context for a new run that discards events.
    #[must_use]
    pub fn new(client: Arc<dyn ChatClient>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            client,
            event_sink: Arc::new(NoOpEventSink),
            history: CallHistory::new(),
        }
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Returns the run id attached to every event.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Returns the chat client.
    #[must_use]
    pub fn client(&self) -> &dyn ChatClient {
        self.client.as_ref()
    }

    /// Returns the event sink.
    #[must_use]
    pub fn event_sink(&self) -> &Arc<dyn EventSink> {
        &self.event_sink
    }

    /// Returns the model calls made during this run.
    #[must_use]
    pub fn history(&self) -> &CallHistory {
        &self.history
    }

    /// Emits an event, adding `run_id` to object payloads.
    pub async fn emit(&self, event_type: &str, data: Value) {
        let data = match data {
            Value::Object(mut map) => {
                map.insert("run_id".to_string(), Value::String(self.run_id.to_string()));
                Value::Object(map)
            }
            other => other,
        };
        self.event_sink.emit(event_type, Some(data)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CollectingEventSink;
    use crate::llm::MockChatClient;

    #[tokio::test]
    async fn test_emit_adds_run_id() {
        let sink = Arc::new(CollectingEventSink::new());
        let ctx = RunContext::new(Arc::new(MockChatClient::echo()))
            .with_event_sink(sink.clone());

        ctx.emit("stage.started", serde_json::json!({"stage": "DefineDataset"}))
            .await;

        let events = sink.events();
        let data = events[0].1.as_ref().unwrap();
        assert_eq!(data["run_id"], ctx.run_id().to_string());
        assert_eq!(data["stage"], "DefineDataset");
    }

    #[test]
    fn test_each_context_starts_a_fresh_history() {
        let ctx = RunContext::new(Arc::new(MockChatClient::echo()));
        let other = RunContext::new(Arc::new(MockChatClient::echo()));

        assert!(ctx.history().is_empty());
        assert_ne!(ctx.run_id(), other.run_id());
        assert_eq!(ctx.clone().run_id(), ctx.run_id());
    }
}
