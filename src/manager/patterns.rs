//! Success-pattern ledger.
//!
//! Append-only record of successful executions grouped by
//! `category-capability-capability...`. Read-side analytics only; dispatch
//! never looks at it.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agent::{Agent, AgentId};
use crate::error::StorageError;
use crate::task::{Horizon, Priority, Task, TaskId, TaskResult};

/// Lightweight summary of one successful execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessPattern {
    pub task_id: TaskId,
    pub task_name: String,
    pub agent_id: AgentId,
    pub agent_name: String,
    pub duration_seconds: f64,
    pub timestamp: DateTime<Utc>,
    pub subtasks: usize,
    pub priority: Priority,
    pub horizon: Horizon,
}

impl SuccessPattern {
    pub fn new(task: &Task, result: &TaskResult, agent: &Agent) -> Self {
        Self {
            task_id: result.task_id,
            task_name: task.name.clone(),
            agent_id: agent.id(),
            agent_name: agent.name().to_string(),
            duration_seconds: result.duration_seconds,
            timestamp: Utc::now(),
            subtasks: task.subtasks.len(),
            priority: task.priority,
            horizon: task.horizon,
        }
    }
}

/// Ledger key for a task: its category followed by its sorted capabilities.
pub fn pattern_key(task: &Task) -> String {
    let category = task.category_or_default();
    if task.capabilities_required.is_empty() {
        return category.to_string();
    }

    // BTreeSet iterates in sorted order already
    let caps: Vec<&str> = task
        .capabilities_required
        .iter()
        .map(|c| c.as_str())
        .collect();
    format!("{category}-{}", caps.join("-"))
}

/// Success patterns keyed by `pattern_key`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SuccessPatternLedger {
    patterns: BTreeMap<String, Vec<SuccessPattern>>,
}

impl SuccessPatternLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a pattern under the task's key and return that key.
    pub fn record(&mut self, task: &Task, result: &TaskResult, agent: &Agent) -> String {
        let key = pattern_key(task);
        self.patterns
            .entry(key.clone())
            .or_default()
            .push(SuccessPattern::new(task, result, agent));
        key
    }

    pub fn get(&self, key: &str) -> &[SuccessPattern] {
        self.patterns.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All patterns, or only those whose key starts with `category`.
    pub fn query(&self, category: Option<&str>) -> BTreeMap<String, Vec<SuccessPattern>> {
        match category {
            None => self.patterns.clone(),
            Some(prefix) => self
                .patterns
                .iter()
                .filter(|(key, _)| key.starts_with(prefix))
                .map(|(key, patterns)| (key.clone(), patterns.clone()))
                .collect(),
        }
    }

    /// Total number of recorded patterns across all keys.
    pub fn len(&self) -> usize {
        self.patterns.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Write the ledger as pretty JSON.
    pub async fn export(&self, path: &Path) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(&self.patterns)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Capability;
    use crate::task::TaskOutcome;

    fn success_for(task: &mut Task, agent: &Agent) -> TaskResult {
        let now = Utc::now();
        TaskResult::succeeded(task.ensure_id(), agent.id(), now, now, TaskOutcome::new("ok"))
    }

    #[test]
    fn key_without_capabilities_is_category() {
        assert_eq!(pattern_key(&Task::new("t")), "general");
        assert_eq!(pattern_key(&Task::new("t").with_category("ops")), "ops");
    }

    #[test]
    fn key_sorts_capabilities() {
        let task = Task::new("t")
            .with_category("build")
            .requiring(Capability::TaskPlanning)
            .requiring(Capability::CodeGeneration);
        assert_eq!(pattern_key(&task), "build-code_generation-task_planning");
    }

    #[test]
    fn record_appends_in_order() {
        let agent = Agent::new("Coder", [Capability::CodeGeneration]);
        let mut ledger = SuccessPatternLedger::new();

        let mut first = Task::new("first").requiring(Capability::CodeGeneration);
        let mut second = Task::new("second")
            .requiring(Capability::CodeGeneration)
            .with_subtask("a");
        let r1 = success_for(&mut first, &agent);
        let r2 = success_for(&mut second, &agent);

        let key = ledger.record(&first, &r1, &agent);
        ledger.record(&second, &r2, &agent);

        assert_eq!(key, "general-code_generation");
        let patterns = ledger.get(&key);
        assert_eq!(patterns.len(), 2);
        assert_eq!(patterns[0].task_name, "first");
        assert_eq!(patterns[1].task_name, "second");
        assert_eq!(patterns[1].subtasks, 1);
        assert_eq!(patterns[1].agent_name, "Coder");
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn query_filters_by_prefix() {
        let agent = Agent::new("Any", []);
        let mut ledger = SuccessPatternLedger::new();
        for category in ["ops", "research", "ops"] {
            let mut task = Task::new(category).with_category(category);
            let result = success_for(&mut task, &agent);
            ledger.record(&task, &result, &agent);
        }

        let ops = ledger.query(Some("ops"));
        assert_eq!(ops.len(), 1);
        assert_eq!(ops["ops"].len(), 2);
        assert_eq!(ledger.query(None).len(), 2);
        assert!(ledger.query(Some("missing")).is_empty());
    }

    #[tokio::test]
    async fn export_writes_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patterns").join("success.json");
        let agent = Agent::new("Any", []);
        let mut ledger = SuccessPatternLedger::new();
        let mut task = Task::new("export me");
        let result = success_for(&mut task, &agent);
        ledger.record(&task, &result, &agent);

        ledger.export(&path).await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed["general"][0]["task_name"], "export me");
    }
}
