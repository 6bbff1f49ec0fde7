//! Tasks: the units of work the fleet dispatches.
//!
//! - `state`: Status state machine (Pending → InProgress → Completed/Failed, Blocked ↔ InProgress)
//! - `model`: Task entity, identifiers, priority and horizon
//! - `result`: Execution results and handler outcomes

pub mod model;
pub mod result;
pub mod state;

pub use model::{Horizon, Priority, Subtask, Task, TaskId};
pub use result::{TaskOutcome, TaskResult};
pub use state::TaskStatus;
