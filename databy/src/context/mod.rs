//! Per-request state: the session record, the agent heart monitor and the
//! run context handed to every stage.

mod agent;
mod run;
mod session;

pub use agent::AgentStatus;
pub use run::RunContext;
pub use session::SessionRecord;
