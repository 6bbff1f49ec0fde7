//! Agents: capability-tagged workers that execute one task at a time.

use std::collections::BTreeSet;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agent::capability::Capability;
use crate::agent::handler::{HandlerError, SubtaskHandler, TaskHandler};
use crate::agent::state::AgentState;
use crate::task::{Task, TaskId, TaskResult, TaskStatus};

/// Opaque agent identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(Uuid);

impl AgentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for AgentId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A worker with a fixed capability set and a pluggable work step.
pub struct Agent {
    id: AgentId,
    name: String,
    capabilities: BTreeSet<Capability>,
    state: Mutex<AgentState>,
    handler: Arc<dyn TaskHandler>,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("capabilities", &self.capabilities)
            .field("handler", &self.handler.kind())
            .finish()
    }
}

impl Agent {
    /// Create an agent that runs the default subtask handler.
    pub fn new(name: impl Into<String>, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        Self::with_handler(name, capabilities, SubtaskHandler)
    }

    /// Create an agent with a specialized work step.
    pub fn with_handler(
        name: impl Into<String>,
        capabilities: impl IntoIterator<Item = Capability>,
        handler: impl TaskHandler + 'static,
    ) -> Self {
        let id = AgentId::new();
        let name = name.into();
        let capabilities: BTreeSet<Capability> = capabilities.into_iter().collect();
        Self {
            id,
            state: Mutex::new(AgentState::new(id, name.clone(), capabilities.clone())),
            name,
            capabilities,
            handler: Arc::new(handler),
        }
    }

    /// Builder: use a caller-chosen ID.
    pub fn with_id(mut self, id: AgentId) -> Self {
        self.id = id;
        self.state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .agent_id = id;
        self
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capabilities(&self) -> &BTreeSet<Capability> {
        &self.capabilities
    }

    /// True if every capability the task requires is one this agent has.
    pub fn can_handle(&self, task: &Task) -> bool {
        task.capabilities_required.is_subset(&self.capabilities)
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> AgentState {
        self.lock_state().clone()
    }

    pub fn is_busy(&self) -> bool {
        self.lock_state().is_busy()
    }

    /// Mark the agent busy with `task_id`.
    ///
    /// Returns `None` if the agent already has a task. The returned lease
    /// frees the agent when dropped.
    pub fn try_claim(&self, task_id: TaskId) -> Option<AgentLease<'_>> {
        if self.lock_state().occupy(task_id) {
            Some(AgentLease {
                agent: self,
                task_id,
            })
        } else {
            None
        }
    }

    /// Execute a task on this agent.
    ///
    /// Never returns an error: a busy agent, a task that cannot start, a
    /// failing work step or a panicking one all come back as a failed result.
    pub async fn execute(&self, task: &mut Task) -> TaskResult {
        let task_id = task.ensure_id();

        if !task.status().can_transition_to(TaskStatus::InProgress) {
            return TaskResult::rejected(
                task_id,
                format!("task is {}, cannot start it", task.status()),
            );
        }

        match self.try_claim(task_id) {
            Some(lease) => self.run(lease, task).await,
            None => {
                tracing::warn!(agent = %self.id, task = %task_id, "Agent is busy, refusing task");
                TaskResult::rejected(task_id, format!("agent {} is busy", self.name))
            }
        }
    }

    /// Run a task on an agent that has already been claimed for it.
    pub(crate) async fn run(&self, lease: AgentLease<'_>, task: &mut Task) -> TaskResult {
        let task_id = lease.task_id();

        if let Err(e) = task.mark_in_progress() {
            return TaskResult::rejected(task_id, e.to_string());
        }

        tracing::debug!(
            agent = %self.id,
            task = %task_id,
            handler = self.handler.kind(),
            "Task started"
        );

        let start = Utc::now();
        let outcome = AssertUnwindSafe(self.handler.perform(task))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(HandlerError::Panicked(panic_message(&*panic))));
        let end = Utc::now();

        let result = match outcome {
            Ok(outcome) => {
                if let Err(e) = task.mark_completed() {
                    tracing::warn!(task = %task_id, error = %e, "Unexpected task status after run");
                }
                lease.record(true);
                TaskResult::succeeded(task_id, self.id, start, end, outcome)
            }
            Err(err) => {
                tracing::warn!(agent = %self.id, task = %task_id, error = %err, "Task failed");
                if let Err(e) = task.mark_failed() {
                    tracing::warn!(task = %task_id, error = %e, "Unexpected task status after run");
                }
                lease.record(false);
                TaskResult::failed(
                    task_id,
                    Some(self.id),
                    start,
                    end,
                    format!("Task execution failed: {err}"),
                    err.to_string(),
                )
                .with_details(format!("Exception: {err}"))
            }
        };

        drop(lease);
        result
    }

    fn lock_state(&self) -> MutexGuard<'_, AgentState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Exclusive hold on an agent for one task.
///
/// Dropping the lease clears the busy flag and current task and refreshes
/// `last_active`, on every exit path.
pub struct AgentLease<'a> {
    agent: &'a Agent,
    task_id: TaskId,
}

impl<'a> AgentLease<'a> {
    pub fn agent(&self) -> &'a Agent {
        self.agent
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    fn record(&self, success: bool) {
        let mut state = self.agent.lock_state();
        if success {
            state.record_completed(self.task_id);
        } else {
            state.record_failed(self.task_id);
        }
    }
}

impl Drop for AgentLease<'_> {
    fn drop(&mut self) {
        self.agent.lock_state().release();
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
