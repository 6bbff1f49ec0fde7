//! Agent manager: registry, dispatch, and batch execution.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::join_all;
use tokio::sync::RwLock;

use crate::agent::{Agent, AgentId, AgentLease, AgentState};
use crate::error::{RegistryError, Result, StorageError, TaskError};
use crate::manager::metrics::AgentPerformance;
use crate::manager::patterns::{SuccessPattern, SuccessPatternLedger};
use crate::task::{Task, TaskId, TaskResult, TaskStatus};

/// Holds agents, tasks and results, and matches tasks to agents.
///
/// Every table has its own lock and no lock is held while a task runs, so a
/// single manager can be shared across concurrent executions.
pub struct AgentManager {
    /// Registered agents in registration order.
    agents: RwLock<Vec<Arc<Agent>>>,
    /// Latest snapshot of every registered task.
    tasks: RwLock<HashMap<TaskId, Task>>,
    /// Latest result per task.
    results: RwLock<HashMap<TaskId, TaskResult>>,
    patterns: RwLock<SuccessPatternLedger>,
    /// Tasks currently being executed.
    in_flight: Mutex<HashSet<TaskId>>,
}

impl AgentManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self {
            agents: RwLock::new(Vec::new()),
            tasks: RwLock::new(HashMap::new()),
            results: RwLock::new(HashMap::new()),
            patterns: RwLock::new(SuccessPatternLedger::new()),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    // ── Agent registry ──────────────────────────────────────────────

    /// Register an agent. Fails if its ID is already present.
    pub async fn register_agent(&self, agent: impl Into<Arc<Agent>>) -> Result<AgentId> {
        let agent = agent.into();
        let id = agent.id();

        let mut agents = self.agents.write().await;
        if agents.iter().any(|a| a.id() == id) {
            return Err(RegistryError::DuplicateAgent { id }.into());
        }
        tracing::debug!(agent = %id, name = agent.name(), "Registered agent");
        agents.push(agent);
        Ok(id)
    }

    /// Remove an agent from the registry.
    ///
    /// A run already in progress on that agent finishes normally.
    pub async fn unregister_agent(&self, id: AgentId) -> Result<Arc<Agent>> {
        let mut agents = self.agents.write().await;
        let pos = agents
            .iter()
            .position(|a| a.id() == id)
            .ok_or(RegistryError::AgentNotFound { id })?;
        tracing::debug!(agent = %id, "Unregistered agent");
        Ok(agents.remove(pos))
    }

    pub async fn get_agent(&self, id: AgentId) -> Result<Arc<Agent>> {
        self.agents
            .read()
            .await
            .iter()
            .find(|a| a.id() == id)
            .cloned()
            .ok_or_else(|| RegistryError::AgentNotFound { id }.into())
    }

    /// All agents in registration order.
    pub async fn list_agents(&self) -> Vec<Arc<Agent>> {
        self.agents.read().await.clone()
    }

    /// State snapshots of every agent, in registration order.
    pub async fn agent_states(&self) -> Vec<AgentState> {
        self.agents.read().await.iter().map(|a| a.state()).collect()
    }

    pub async fn agent_count(&self) -> usize {
        self.agents.read().await.len()
    }

    /// First idle agent, in registration order, that can handle the task.
    pub async fn find_agent_for_task(&self, task: &Task) -> Option<Arc<Agent>> {
        self.agents
            .read()
            .await
            .iter()
            .find(|a| a.can_handle(task) && !a.is_busy())
            .cloned()
    }

    // ── Task table ──────────────────────────────────────────────────

    /// Register a task, assigning an ID if it has none. Returns the ID.
    pub async fn register_task(&self, task: &mut Task) -> TaskId {
        let id = task.ensure_id();
        self.tasks.write().await.insert(id, task.clone());
        id
    }

    pub async fn get_task(&self, id: TaskId) -> Result<Task> {
        self.tasks
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| RegistryError::TaskNotFound { id }.into())
    }

    pub async fn list_tasks(&self) -> Vec<Task> {
        self.tasks.read().await.values().cloned().collect()
    }

    pub async fn get_task_result(&self, id: TaskId) -> Option<TaskResult> {
        self.results.read().await.get(&id).cloned()
    }

    pub async fn task_results(&self) -> Vec<TaskResult> {
        self.results.read().await.values().cloned().collect()
    }

    // ── Execution ───────────────────────────────────────────────────

    /// Execute a task, on `agent_id` if given or on the first idle capable agent.
    ///
    /// Only an unknown `agent_id` or a task that cannot start (already running,
    /// already finished) is an error. When no agent is available the returned
    /// result is a failure and the task itself is left untouched.
    pub async fn execute_task(
        &self,
        task: &mut Task,
        agent_id: Option<AgentId>,
    ) -> Result<TaskResult> {
        let registered = match task.id() {
            Some(id) => self.tasks.read().await.contains_key(&id).then_some(id),
            None => None,
        };
        let task_id = match registered {
            Some(id) => id,
            None => self.register_task(task).await,
        };

        self.check_startable(task).await?;
        let _running = self.mark_in_flight(task_id)?;

        // Snapshot so no registry lock is held while the task runs
        let agents = self.list_agents().await;
        let lease = match agent_id {
            Some(id) => {
                let agent = agents
                    .iter()
                    .find(|a| a.id() == id)
                    .ok_or(RegistryError::AgentNotFound { id })?;
                match agent.try_claim(task_id) {
                    Some(lease) => lease,
                    None => {
                        let result = TaskResult::rejected(
                            task_id,
                            format!("agent {} is busy", agent.name()),
                        );
                        self.store_result(result.clone()).await;
                        return Ok(result);
                    }
                }
            }
            None => match Self::claim_first_capable(&agents, task) {
                Some(lease) => lease,
                None => {
                    tracing::info!(task = %task_id, name = %task.name, "No suitable agent for task");
                    let result = TaskResult::no_suitable_agent(task_id);
                    self.store_result(result.clone()).await;
                    return Ok(result);
                }
            },
        };

        let agent = lease.agent();
        tracing::debug!(task = %task_id, agent = %agent.id(), "Dispatching task");

        let result = agent.run(lease, task).await;

        self.tasks.write().await.insert(task_id, task.clone());
        self.store_result(result.clone()).await;

        if result.success {
            let key = self.patterns.write().await.record(task, &result, agent);
            tracing::debug!(task = %task_id, pattern = %key, "Recorded success pattern");
        }

        tracing::info!(
            task = %task_id,
            agent = %agent.id(),
            success = result.success,
            duration_s = result.duration_seconds,
            "Task execution finished"
        );
        Ok(result)
    }

    /// Execute several tasks.
    ///
    /// In parallel mode every task is dispatched at once and joined; in
    /// sequential mode tasks run one after another in input order. Each
    /// task's outcome is independent, and tasks that cannot start are
    /// reported as failed results.
    pub async fn execute_batch(
        &self,
        tasks: &mut [Task],
        parallel: bool,
    ) -> HashMap<TaskId, TaskResult> {
        tracing::debug!(count = tasks.len(), parallel, "Executing batch");

        let outcomes = if parallel {
            let runs = tasks.iter_mut().map(|task| self.execute_in_batch(task));
            join_all(runs).await
        } else {
            let mut outcomes = Vec::with_capacity(tasks.len());
            for task in tasks.iter_mut() {
                outcomes.push(self.execute_in_batch(task).await);
            }
            outcomes
        };

        // A duplicate copy's rejection never replaces a result that was stored
        let mut results = HashMap::with_capacity(outcomes.len());
        for outcome in outcomes {
            match outcome {
                BatchOutcome::Stored(id, result) => {
                    results.insert(id, result);
                }
                BatchOutcome::Rejected(id, result) => {
                    results.entry(id).or_insert(result);
                }
            }
        }
        results
    }

    async fn execute_in_batch(&self, task: &mut Task) -> BatchOutcome {
        let outcome = self.execute_task(task, None).await;
        let task_id = task.ensure_id();
        match outcome {
            Ok(result) => BatchOutcome::Stored(task_id, result),
            Err(e) => {
                tracing::warn!(task = %task_id, error = %e, "Task rejected in batch");
                BatchOutcome::Rejected(task_id, TaskResult::rejected(task_id, e.to_string()))
            }
        }
    }

    fn claim_first_capable<'a>(agents: &'a [Arc<Agent>], task: &Task) -> Option<AgentLease<'a>> {
        let task_id = task.id()?;
        agents
            .iter()
            .filter(|a| a.can_handle(task))
            .find_map(|a| a.try_claim(task_id))
    }

    /// Reject tasks that are running or finished, including stale copies of
    /// a task whose registered snapshot has already finished.
    async fn check_startable(&self, task: &Task) -> Result<()> {
        let status = match task.id() {
            Some(id) => self
                .tasks
                .read()
                .await
                .get(&id)
                .map(|stored| stored.status())
                .filter(|s| s.is_terminal())
                .unwrap_or(task.status()),
            None => task.status(),
        };

        if !status.can_transition_to(TaskStatus::InProgress) {
            return Err(TaskError::InvalidTransition {
                id: task.id(),
                from: status,
                to: TaskStatus::InProgress,
            }
            .into());
        }
        Ok(())
    }

    fn mark_in_flight(&self, id: TaskId) -> Result<InFlight<'_>> {
        let mut running = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !running.insert(id) {
            return Err(TaskError::AlreadyRunning { id }.into());
        }
        Ok(InFlight { manager: self, id })
    }

    async fn store_result(&self, result: TaskResult) {
        self.results.write().await.insert(result.task_id, result);
    }

    // ── Analytics ───────────────────────────────────────────────────

    /// Success patterns, optionally limited to keys starting with `category`.
    pub async fn success_patterns(
        &self,
        category: Option<&str>,
    ) -> BTreeMap<String, Vec<SuccessPattern>> {
        self.patterns.read().await.query(category)
    }

    pub async fn export_success_patterns(
        &self,
        path: &Path,
    ) -> std::result::Result<(), StorageError> {
        let ledger = self.patterns.read().await.clone();
        ledger.export(path).await
    }

    /// Metrics for every agent, in registration order.
    pub async fn agent_performance(&self) -> Vec<AgentPerformance> {
        let agents = self.list_agents().await;
        let results = self.results.read().await;
        agents
            .iter()
            .map(|agent| AgentPerformance::derive(&agent.state(), &results))
            .collect()
    }
}

impl Default for AgentManager {
    fn default() -> Self {
        Self::new()
    }
}

/// One batch entry: a result kept in the result table, or a rejection that was not.
enum BatchOutcome {
    Stored(TaskId, TaskResult),
    Rejected(TaskId, TaskResult),
}

/// Removes a task from the in-flight set when dropped.
struct InFlight<'a> {
    manager: &'a AgentManager,
    id: TaskId,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.manager
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}
