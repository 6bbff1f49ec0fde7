//! Agent runtime state.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agent::AgentId;
use crate::agent::capability::Capability;
use crate::task::TaskId;

/// Snapshot of an agent's occupancy and history.
///
/// An agent is busy exactly when it has a current task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    pub agent_id: AgentId,
    pub name: String,
    pub capabilities: BTreeSet<Capability>,
    current_task: Option<TaskId>,
    pub completed_tasks: Vec<TaskId>,
    pub failed_tasks: Vec<TaskId>,
    pub last_active: DateTime<Utc>,
}

impl AgentState {
    pub fn new(agent_id: AgentId, name: impl Into<String>, capabilities: BTreeSet<Capability>) -> Self {
        Self {
            agent_id,
            name: name.into(),
            capabilities,
            current_task: None,
            completed_tasks: Vec::new(),
            failed_tasks: Vec::new(),
            last_active: Utc::now(),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.current_task.is_some()
    }

    pub fn current_task(&self) -> Option<TaskId> {
        self.current_task
    }

    /// Take the agent for `task_id`. Returns false if it is already busy.
    pub(crate) fn occupy(&mut self, task_id: TaskId) -> bool {
        if self.current_task.is_some() {
            return false;
        }
        self.current_task = Some(task_id);
        self.last_active = Utc::now();
        true
    }

    pub(crate) fn release(&mut self) {
        self.current_task = None;
        self.last_active = Utc::now();
    }

    pub(crate) fn record_completed(&mut self, task_id: TaskId) {
        self.completed_tasks.push(task_id);
    }

    pub(crate) fn record_failed(&mut self, task_id: TaskId) {
        self.failed_tasks.push(task_id);
    }

    /// Number of tasks this agent has finished either way.
    pub fn total_tasks(&self) -> usize {
        self.completed_tasks.len() + self.failed_tasks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn occupy_and_release() {
        let mut state = AgentState::new(AgentId::new(), "worker", BTreeSet::new());
        assert!(!state.is_busy());

        let task_id = TaskId::new();
        assert!(state.occupy(task_id));
        assert!(state.is_busy());
        assert_eq!(state.current_task(), Some(task_id));

        // Second occupant is refused
        assert!(!state.occupy(TaskId::new()));
        assert_eq!(state.current_task(), Some(task_id));

        state.release();
        assert!(!state.is_busy());
        assert!(state.current_task().is_none());
    }

    #[test]
    fn history_counts() {
        let mut state = AgentState::new(AgentId::new(), "worker", BTreeSet::new());
        state.record_completed(TaskId::new());
        state.record_completed(TaskId::new());
        state.record_failed(TaskId::new());
        assert_eq!(state.total_tasks(), 3);
    }
}
