//! Agents: capability-tagged workers.
//!
//! - `capability`: Skill tags used for matching
//! - `state`: Busy/idle state and execution history
//! - `handler`: The pluggable work step (`TaskHandler`)
//! - `agent`: `Agent::execute`, which wraps a handler in the task/agent state transitions

#[allow(clippy::module_inception)]
pub mod agent;
pub mod capability;
pub mod handler;
pub mod state;

pub use agent::{Agent, AgentId, AgentLease};
pub use capability::Capability;
pub use handler::{HandlerError, SubtaskHandler, TaskHandler};
pub use state::AgentState;
