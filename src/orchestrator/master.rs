//! Master player: the orchestrator façade over one `AgentManager`.
//!
//! Adds a start/stop lifecycle, mirrored agent and task registries, the
//! ownership ledger, an event log, and forwarding to the storage and
//! analytics collaborators.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::agent::{Agent, AgentId, Capability};
use crate::analytics::{PatternLog, PatternSink, SuccessRecord};
use crate::config::OrchestratorConfig;
use crate::error::{RegistryError, Result};
use crate::manager::{AgentManager, AgentPerformance};
use crate::orchestrator::ownership::{
    OwnershipKind, OwnershipLedger, OwnershipLevel, OwnershipReport,
};
use crate::storage::{ContextStore, FileStore, MemoryStore, SystemEvent};
use crate::task::{Horizon, Priority, Task, TaskId, TaskResult, TaskStatus};

/// Structured parameters for a new task. Unset priority and horizon take the
/// configured defaults.
#[derive(Debug, Clone, Default)]
pub struct TaskRequest {
    pub name: String,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub horizon: Option<Horizon>,
    pub capabilities: Vec<Capability>,
    pub subtasks: Vec<String>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl TaskRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_horizon(mut self, horizon: Horizon) -> Self {
        self.horizon = Some(horizon);
        self
    }

    pub fn requiring(mut self, capability: Capability) -> Self {
        self.capabilities.push(capability);
        self
    }

    pub fn with_subtask(mut self, name: impl Into<String>) -> Self {
        self.subtasks.push(name.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Active,
    Inactive,
}

/// Orchestrator-side view of a registered agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub agent_id: AgentId,
    pub name: String,
    pub registered_at: DateTime<Utc>,
    pub ownership_level: OwnershipLevel,
    pub status: RecordStatus,
}

/// Orchestrator-side view of a created task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_id: TaskId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub status: TaskStatus,
    pub assigned_agent: Option<AgentId>,
}

#[derive(Debug, Default)]
struct Lifecycle {
    active: bool,
    startup_time: Option<DateTime<Utc>>,
    shutdown_time: Option<DateTime<Utc>>,
}

pub struct MasterPlayer {
    config: OrchestratorConfig,
    manager: AgentManager,
    store: Arc<dyn ContextStore>,
    sink: Arc<dyn PatternSink>,
    lifecycle: RwLock<Lifecycle>,
    agents: RwLock<HashMap<AgentId, AgentRecord>>,
    tasks: RwLock<HashMap<TaskId, TaskRecord>>,
    ownership: RwLock<OwnershipLedger>,
    /// Most recent events, bounded by `config.event_log_capacity`.
    events: RwLock<VecDeque<SystemEvent>>,
}

impl MasterPlayer {
    pub fn new(
        config: OrchestratorConfig,
        store: Arc<dyn ContextStore>,
        sink: Arc<dyn PatternSink>,
    ) -> Self {
        Self {
            config,
            manager: AgentManager::new(),
            store,
            sink,
            lifecycle: RwLock::new(Lifecycle::default()),
            agents: RwLock::new(HashMap::new()),
            tasks: RwLock::new(HashMap::new()),
            ownership: RwLock::new(OwnershipLedger::new()),
            events: RwLock::new(VecDeque::new()),
        }
    }

    /// Orchestrator with in-process collaborators only.
    pub fn in_memory(config: OrchestratorConfig) -> Self {
        Self::new(config, Arc::new(MemoryStore::new()), Arc::new(PatternLog::new()))
    }

    /// Orchestrator persisting to `config.data_dir`.
    pub fn on_disk(config: OrchestratorConfig) -> Self {
        let store = FileStore::new(&config.data_dir);
        let sink = PatternLog::new().with_export(
            config
                .data_dir
                .join(crate::storage::file::paths::PATTERNS)
                .join("success_records.json"),
        );
        Self::new(config, Arc::new(store), Arc::new(sink))
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn manager(&self) -> &AgentManager {
        &self.manager
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Activate the orchestrator and prepare storage. No-op if already active.
    pub async fn start(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.write().await;
        if lifecycle.active {
            tracing::warn!("Orchestrator is already active");
            return Ok(());
        }

        self.store.prepare().await?;

        let now = Utc::now();
        lifecycle.active = true;
        lifecycle.startup_time = Some(now);
        drop(lifecycle);

        self.record_event(
            SystemEvent::new("system_start", "Orchestrator started")
                .with_meta("startup_time", now.to_rfc3339()),
        )
        .await;

        tracing::info!("Orchestrator active");
        Ok(())
    }

    /// Flush collaborators and deactivate. No-op if not active.
    pub async fn stop(&self) {
        let mut lifecycle = self.lifecycle.write().await;
        if !lifecycle.active {
            tracing::warn!("Orchestrator is not active");
            return;
        }

        self.save_contexts().await;
        if let Err(e) = self.store.flush().await {
            tracing::warn!(error = %e, "Failed to flush context store");
        }
        if let Err(e) = self.sink.flush().await {
            tracing::warn!(error = %e, "Failed to flush pattern sink");
        }

        let now = Utc::now();
        let uptime = lifecycle
            .startup_time
            .map(|start| (now - start).num_milliseconds().max(0) as f64 / 1000.0)
            .unwrap_or(0.0);
        lifecycle.active = false;
        lifecycle.shutdown_time = Some(now);
        drop(lifecycle);

        self.record_event(
            SystemEvent::new("system_stop", "Orchestrator stopped").with_meta("uptime_seconds", uptime),
        )
        .await;

        tracing::info!(uptime_s = uptime, "Orchestrator stopped");
    }

    pub async fn is_active(&self) -> bool {
        self.lifecycle.read().await.active
    }

    pub async fn startup_time(&self) -> Option<DateTime<Utc>> {
        self.lifecycle.read().await.startup_time
    }

    pub async fn shutdown_time(&self) -> Option<DateTime<Utc>> {
        self.lifecycle.read().await.shutdown_time
    }

    async fn ensure_started(&self) -> Result<()> {
        if !self.is_active().await {
            self.start().await?;
        }
        Ok(())
    }

    // ── Agents ──────────────────────────────────────────────────────

    /// Register an agent, starting the orchestrator first if needed.
    pub async fn register_agent(
        &self,
        agent: impl Into<Arc<Agent>>,
        level: Option<OwnershipLevel>,
    ) -> Result<AgentId> {
        self.ensure_started().await?;
        let agent = agent.into();

        // Held across the capacity check so concurrent registrations cannot overshoot
        let mut records = self.agents.write().await;
        let max = self.config.max_agents;
        if self.manager.agent_count().await >= max {
            return Err(RegistryError::CapacityReached { max }.into());
        }

        let id = self.manager.register_agent(agent.clone()).await?;
        records.insert(
            id,
            AgentRecord {
                agent_id: id,
                name: agent.name().to_string(),
                registered_at: Utc::now(),
                ownership_level: level.unwrap_or(self.config.ownership_level),
                status: RecordStatus::Active,
            },
        );
        drop(records);

        self.ownership
            .write()
            .await
            .insert(OwnershipKind::Agents, id.to_string());
        self.record_event(
            SystemEvent::new("agent_registered", format!("Agent {} registered", agent.name()))
                .with_meta("agent_id", id.to_string()),
        )
        .await;

        tracing::info!(agent = %id, name = agent.name(), "Agent registered");
        Ok(id)
    }

    /// Unregister an agent. Returns `Ok(false)` while the orchestrator is inactive.
    pub async fn unregister_agent(&self, id: AgentId) -> Result<bool> {
        if !self.is_active().await {
            tracing::warn!(agent = %id, "Orchestrator is not active, not unregistering agent");
            return Ok(false);
        }

        self.manager.unregister_agent(id).await?;

        if let Some(record) = self.agents.write().await.get_mut(&id) {
            record.status = RecordStatus::Inactive;
        }
        self.ownership
            .write()
            .await
            .remove(OwnershipKind::Agents, &id.to_string());
        self.record_event(
            SystemEvent::new("agent_unregistered", format!("Agent {id} unregistered"))
                .with_meta("agent_id", id.to_string()),
        )
        .await;

        tracing::info!(agent = %id, "Agent unregistered");
        Ok(true)
    }

    pub async fn agent_record(&self, id: AgentId) -> Option<AgentRecord> {
        self.agents.read().await.get(&id).cloned()
    }

    pub async fn agent_records(&self) -> Vec<AgentRecord> {
        self.agents.read().await.values().cloned().collect()
    }

    // ── Tasks ───────────────────────────────────────────────────────

    /// Build, register and mirror a task.
    pub async fn create_task(&self, request: TaskRequest) -> Result<Task> {
        self.ensure_started().await?;

        let mut task = Task::new(request.name)
            .with_priority(request.priority.unwrap_or(self.config.default_priority))
            .with_horizon(request.horizon.unwrap_or(self.config.default_horizon))
            .with_capabilities(request.capabilities);
        if let Some(desc) = request.description {
            task = task.with_description(desc);
        }
        for subtask in request.subtasks {
            task = task.with_subtask(subtask);
        }
        for (key, value) in request.metadata {
            task = task.with_metadata(key, value);
        }

        let id = self.manager.register_task(&mut task).await;
        self.tasks.write().await.insert(
            id,
            TaskRecord {
                task_id: id,
                name: task.name.clone(),
                created_at: Utc::now(),
                status: task.status(),
                assigned_agent: None,
            },
        );
        self.ownership
            .write()
            .await
            .insert(OwnershipKind::Tasks, id.to_string());
        self.record_event(
            SystemEvent::new("task_created", format!("Task {} created", task.name))
                .with_meta("task_id", id.to_string()),
        )
        .await;

        tracing::info!(task = %id, name = %task.name, "Task created");
        Ok(task)
    }

    /// Execute one task through the manager and reconcile the mirrors.
    pub async fn execute_task(&self, task: &mut Task) -> Result<TaskResult> {
        self.ensure_started().await?;
        tracing::info!(name = %task.name, "Executing task");

        let result = self.manager.execute_task(task, None).await?;
        self.after_execution(&result).await;

        tracing::info!(task = %result.task_id, success = result.success, "Task execution completed");
        Ok(result)
    }

    /// Execute several tasks through the manager and reconcile the mirrors.
    pub async fn execute_batch(
        &self,
        tasks: &mut [Task],
        parallel: bool,
    ) -> Result<HashMap<TaskId, TaskResult>> {
        self.ensure_started().await?;
        tracing::info!(count = tasks.len(), parallel, "Executing batch");

        let results = self.manager.execute_batch(tasks, parallel).await;
        for result in results.values() {
            self.after_execution(result).await;
        }

        let succeeded = results.values().filter(|r| r.success).count();
        tracing::info!(succeeded, total = results.len(), "Batch execution completed");
        Ok(results)
    }

    /// Reconcile the mirror and notify the sink from what the manager stored.
    ///
    /// Rejections the manager did not store leave the mirror untouched.
    async fn after_execution(&self, result: &TaskResult) {
        let id = result.task_id;
        if self.manager.get_task_result(id).await.as_ref() != Some(result) {
            tracing::debug!(task = %id, "Result was not stored, skipping reconciliation");
            return;
        }
        let Ok(task) = self.manager.get_task(id).await else {
            return;
        };

        if let Some(record) = self.tasks.write().await.get_mut(&id) {
            record.status = task.status();
            if result.agent_id.is_some() {
                record.assigned_agent = result.agent_id;
            }
        }

        if result.success {
            self.sink
                .record_success(SuccessRecord::from_execution(&task, result))
                .await;
        }

        self.record_event(
            SystemEvent::new("task_executed", format!("Task {} executed", task.name))
                .with_meta("task_id", id.to_string())
                .with_meta("success", result.success),
        )
        .await;
    }

    pub async fn task_record(&self, id: TaskId) -> Option<TaskRecord> {
        self.tasks.read().await.get(&id).cloned()
    }

    pub async fn task_records(&self) -> Vec<TaskRecord> {
        self.tasks.read().await.values().cloned().collect()
    }

    // ── Resources and components ────────────────────────────────────

    pub async fn register_resource(&self, id: impl Into<String>) -> bool {
        self.claim(OwnershipKind::Resources, id.into()).await
    }

    pub async fn release_resource(&self, id: &str) -> bool {
        self.release(OwnershipKind::Resources, id).await
    }

    pub async fn register_component(&self, id: impl Into<String>) -> bool {
        self.claim(OwnershipKind::Components, id.into()).await
    }

    pub async fn release_component(&self, id: &str) -> bool {
        self.release(OwnershipKind::Components, id).await
    }

    async fn claim(&self, kind: OwnershipKind, id: String) -> bool {
        tracing::debug!(?kind, id = %id, "Taking ownership");
        self.ownership.write().await.insert(kind, id)
    }

    async fn release(&self, kind: OwnershipKind, id: &str) -> bool {
        tracing::debug!(?kind, id, "Releasing ownership");
        self.ownership.write().await.remove(kind, id)
    }

    // ── Reporting ───────────────────────────────────────────────────

    pub async fn get_agent_performance(&self) -> Vec<AgentPerformance> {
        self.manager.agent_performance().await
    }

    pub async fn get_ownership_report(&self) -> OwnershipReport {
        self.ownership.read().await.report()
    }

    /// Recent events, oldest first. The full history goes to the `ContextStore`.
    pub async fn events(&self) -> Vec<SystemEvent> {
        self.events.read().await.iter().cloned().collect()
    }

    async fn record_event(&self, event: SystemEvent) {
        if let Err(e) = self.store.record_event(&event).await {
            tracing::warn!(event = %event.event_type, error = %e, "Failed to store event");
        }
        let mut events = self.events.write().await;
        events.push_back(event);
        while events.len() > self.config.event_log_capacity {
            events.pop_front();
        }
    }

    async fn save_contexts(&self) {
        let contexts = [
            ("ownership", serde_json::to_value(self.get_ownership_report().await)),
            ("agents", serde_json::to_value(self.agent_records().await)),
            ("tasks", serde_json::to_value(self.task_records().await)),
            ("performance", serde_json::to_value(self.get_agent_performance().await)),
        ];

        for (key, value) in contexts {
            let saved = match value {
                Ok(value) => self.store.save_context(key, value).await,
                Err(e) => Err(e.into()),
            };
            if let Err(e) = saved {
                tracing::warn!(context = key, error = %e, "Failed to save context");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player() -> MasterPlayer {
        MasterPlayer::in_memory(OrchestratorConfig::default())
    }

    #[tokio::test]
    async fn start_and_stop_are_idempotent() {
        let master = player();
        assert!(!master.is_active().await);

        master.start().await.unwrap();
        let started = master.startup_time().await;
        master.start().await.unwrap();
        assert!(master.is_active().await);
        assert_eq!(master.startup_time().await, started);

        master.stop().await;
        let stopped = master.shutdown_time().await;
        master.stop().await;
        assert!(!master.is_active().await);
        assert_eq!(master.shutdown_time().await, stopped);

        let kinds: Vec<String> = master.events().await.into_iter().map(|e| e.event_type).collect();
        assert_eq!(kinds, vec!["system_start", "system_stop"]);
    }

    #[tokio::test]
    async fn register_agent_auto_starts() {
        let master = player();
        let id = master
            .register_agent(Agent::new("Planner", [Capability::TaskPlanning]), None)
            .await
            .unwrap();

        assert!(master.is_active().await);
        let record = master.agent_record(id).await.unwrap();
        assert_eq!(record.ownership_level, OwnershipLevel::Complete);
        assert_eq!(record.status, RecordStatus::Active);
        assert_eq!(master.get_ownership_report().await.agents, vec![id.to_string()]);
    }

    #[tokio::test]
    async fn capacity_is_enforced() {
        let config = OrchestratorConfig {
            max_agents: 1,
            ..OrchestratorConfig::default()
        };
        let master = MasterPlayer::in_memory(config);
        master.register_agent(Agent::new("one", []), None).await.unwrap();

        let err = master.register_agent(Agent::new("two", []), None).await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Registry(RegistryError::CapacityReached { max: 1 })
        ));
        assert_eq!(master.get_ownership_report().await.num_agents, 1);
    }

    #[tokio::test]
    async fn unregister_marks_record_inactive() {
        let master = player();
        let id = master
            .register_agent(Agent::new("a", []), Some(OwnershipLevel::Managed))
            .await
            .unwrap();

        assert!(master.unregister_agent(id).await.unwrap());
        let record = master.agent_record(id).await.unwrap();
        assert_eq!(record.status, RecordStatus::Inactive);
        assert_eq!(record.ownership_level, OwnershipLevel::Managed);
        assert_eq!(master.get_ownership_report().await.num_agents, 0);

        assert!(master.unregister_agent(id).await.is_err());

        master.stop().await;
        assert!(!master.unregister_agent(AgentId::new()).await.unwrap());
    }

    #[tokio::test]
    async fn create_task_applies_defaults() {
        let config = OrchestratorConfig {
            default_priority: Priority::Low,
            default_horizon: Horizon::H3,
            ..OrchestratorConfig::default()
        };
        let master = MasterPlayer::in_memory(config);

        let task = master
            .create_task(TaskRequest::new("defaults"))
            .await
            .unwrap();
        assert_eq!(task.priority, Priority::Low);
        assert_eq!(task.horizon, Horizon::H3);

        let explicit = master
            .create_task(TaskRequest::new("explicit").with_priority(Priority::Critical))
            .await
            .unwrap();
        assert_eq!(explicit.priority, Priority::Critical);
        assert_eq!(explicit.horizon, Horizon::H3);

        let id = task.id().unwrap();
        let record = master.task_record(id).await.unwrap();
        assert_eq!(record.status, TaskStatus::Pending);
        assert_eq!(record.assigned_agent, None);
        assert_eq!(master.get_ownership_report().await.num_tasks, 2);
        assert!(master.manager().get_task(id).await.is_ok());
    }

    #[tokio::test]
    async fn execution_reconciles_mirror() {
        let master = player();
        let agent_id = master
            .register_agent(Agent::new("Coder", [Capability::CodeGeneration]), None)
            .await
            .unwrap();
        let mut task = master
            .create_task(TaskRequest::new("write code").requiring(Capability::CodeGeneration))
            .await
            .unwrap();

        let result = master.execute_task(&mut task).await.unwrap();
        assert!(result.success);

        let record = master.task_record(task.id().unwrap()).await.unwrap();
        assert_eq!(record.status, TaskStatus::Completed);
        assert_eq!(record.assigned_agent, Some(agent_id));
    }

    #[tokio::test]
    async fn event_log_keeps_most_recent() {
        let config = OrchestratorConfig {
            event_log_capacity: 3,
            ..OrchestratorConfig::default()
        };
        let store = Arc::new(MemoryStore::new());
        let master = MasterPlayer::new(config, store.clone(), Arc::new(PatternLog::new()));

        for name in ["a", "b", "c", "d"] {
            master.create_task(TaskRequest::new(name)).await.unwrap();
        }

        let events = master.events().await;
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|e| e.event_type == "task_created"));
        assert_eq!(events[2].description, "Task d created");

        // The store still sees every event
        assert_eq!(store.events().await.len(), 5);
    }

    #[tokio::test]
    async fn resources_and_components() {
        let master = player();
        assert!(master.register_resource("gpu-0").await);
        assert!(!master.register_resource("gpu-0").await);
        assert!(master.register_component("ollama").await);

        let report = master.get_ownership_report().await;
        assert_eq!(report.num_resources, 1);
        assert_eq!(report.num_components, 1);
        assert_eq!(report.total_owned, 2);

        assert!(master.release_resource("gpu-0").await);
        assert!(!master.release_component("missing").await);
        assert_eq!(master.get_ownership_report().await.total_owned, 1);
    }
}
