//! Agent heart monitor.

use crate::errors::DatabyError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Liveness and progress marker for the agent running a session.
///
/// `state` names the stage about to execute. Streaming consumers poll it to
/// show progress; nothing in the pipeline reads it for control decisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStatus {
    alive: bool,
    state: Option<String>,
    timestamp: DateTime<Utc>,
}

impl Default for AgentStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentStatus {
    /// Creates an idle status that is not alive.
    #[must_use]
    pub fn new() -> Self {
        Self {
            alive: false,
            state: None,
            timestamp: Utc::now(),
        }
    }

    /// Rebuilds a status from stored parts.
    ///
    /// A status that is not alive cannot carry a state.
    pub fn restore(alive: bool, state: Option<String>) -> Result<Self, DatabyError> {
        if let (false, Some(state)) = (alive, state.as_ref()) {
            return Err(DatabyError::AgentState(state.clone()));
        }

        Ok(Self {
            alive,
            state,
            timestamp: Utc::now(),
        })
    }

    /// Returns whether the agent is alive.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Returns the current state marker.
    #[must_use]
    pub fn state(&self) -> Option<&str> {
        self.state.as_deref()
    }

    /// Returns the time of the last liveness change.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns the time of the last liveness change as ISO-8601.
    #[must_use]
    pub fn last_ping(&self) -> String {
        self.timestamp.to_rfc3339()
    }

    /// Marks the agent alive or dead and refreshes the timestamp.
    ///
    /// Marking the agent dead clears the state marker.
    pub fn set_alive(&mut self, alive: bool) {
        self.alive = alive;
        if !alive {
            self.state = None;
        }
        self.timestamp = Utc::now();
    }

    /// Publishes the name of the stage about to execute.
    pub fn set_state(&mut self, state: impl Into<String>) {
        self.state = Some(state.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_status_is_idle() {
        let status = AgentStatus::new();
        assert!(!status.is_alive());
        assert_eq!(status.state(), None);
    }

    #[test]
    fn test_restore_rejects_dead_agent_with_state() {
        let err = AgentStatus::restore(false, Some("DefineDataset".to_string())).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Agent is not alive but state shows the agent is DefineDataset"
        );

        assert!(AgentStatus::restore(true, Some("DefineDataset".to_string())).is_ok());
        assert!(AgentStatus::restore(false, None).is_ok());
    }

    #[test]
    fn test_set_alive_refreshes_timestamp() {
        let mut status = AgentStatus::new();
        let before = status.timestamp();
        std::thread::sleep(std::time::Duration::from_millis(2));

        status.set_alive(true);
        assert!(status.is_alive());
        assert!(status.timestamp() > before);
        assert!(status.last_ping().starts_with(&status.timestamp().format("%Y-%m-%d").to_string()));
    }

    #[test]
    fn test_set_alive_false_clears_state() {
        let mut status = AgentStatus::new();
        status.set_alive(true);
        status.set_state("DescribeDataset");
        assert_eq!(status.state(), Some("DescribeDataset"));

        status.set_alive(false);
        assert_eq!(status.state(), None);
    }
}
