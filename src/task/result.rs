//! Execution results.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agent::AgentId;
use crate::task::model::TaskId;
use crate::task::state::TaskStatus;

/// What a handler produces when its work step returns normally.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default)]
    pub artifacts: HashMap<String, serde_json::Value>,
}

impl TaskOutcome {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            ..Default::default()
        }
    }

    /// Builder: set details.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Builder: add a named artifact.
    pub fn with_artifact(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.artifacts.insert(name.into(), value);
        self
    }
}

/// Outcome of one execution of a task.
///
/// A successful result always carries `TaskStatus::Completed`; a failed one
/// always carries `TaskStatus::Failed` and at least one error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: TaskId,
    pub success: bool,
    pub status: TaskStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// `end_time - start_time` in seconds.
    pub duration_seconds: f64,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default)]
    pub artifacts: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub errors: Vec<String>,
    /// Agent that ran the task, if any did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<AgentId>,
}

impl TaskResult {
    /// Build a successful result from a handler outcome.
    pub fn succeeded(
        task_id: TaskId,
        agent_id: AgentId,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        outcome: TaskOutcome,
    ) -> Self {
        Self {
            task_id,
            success: true,
            status: TaskStatus::Completed,
            start_time,
            end_time,
            duration_seconds: seconds_between(start_time, end_time),
            summary: outcome.summary,
            details: outcome.details,
            artifacts: outcome.artifacts,
            errors: Vec::new(),
            agent_id: Some(agent_id),
        }
    }

    /// Build a failed result carrying one error.
    pub fn failed(
        task_id: TaskId,
        agent_id: Option<AgentId>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        summary: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            task_id,
            success: false,
            status: TaskStatus::Failed,
            start_time,
            end_time,
            duration_seconds: seconds_between(start_time, end_time),
            summary: summary.into(),
            details: None,
            artifacts: HashMap::new(),
            errors: vec![error.into()],
            agent_id,
        }
    }

    /// Result for a task no idle, capable agent could take.
    pub fn no_suitable_agent(task_id: TaskId) -> Self {
        let now = Utc::now();
        Self::failed(
            task_id,
            None,
            now,
            now,
            "No suitable agent found for the task",
            "no suitable agent available to execute the task",
        )
    }

    /// Result for a task that was rejected before any agent ran it.
    pub fn rejected(task_id: TaskId, reason: impl Into<String>) -> Self {
        let now = Utc::now();
        let reason = reason.into();
        Self::failed(
            task_id,
            None,
            now,
            now,
            format!("Task rejected: {reason}"),
            reason,
        )
    }

    /// Builder: attach details.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

fn seconds_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start)
        .to_std()
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn succeeded_carries_outcome() {
        let start = Utc::now();
        let end = start + Duration::milliseconds(1500);
        let agent_id = AgentId::new();
        let outcome = TaskOutcome::new("done")
            .with_details("all good")
            .with_artifact("lines", serde_json::json!(42));

        let result = TaskResult::succeeded(TaskId::new(), agent_id, start, end, outcome);
        assert!(result.success);
        assert_eq!(result.status, TaskStatus::Completed);
        assert!(result.errors.is_empty());
        assert_eq!(result.agent_id, Some(agent_id));
        assert_eq!(result.artifacts["lines"], 42);
        assert!((result.duration_seconds - 1.5).abs() < 1e-9);
    }

    #[test]
    fn failed_always_has_error() {
        let now = Utc::now();
        let result = TaskResult::failed(TaskId::new(), None, now, now, "boom", "disk full");
        assert!(!result.success);
        assert_eq!(result.status, TaskStatus::Failed);
        assert_eq!(result.errors, vec!["disk full".to_string()]);
        assert_eq!(result.duration_seconds, 0.0);
    }

    #[test]
    fn no_suitable_agent_result() {
        let result = TaskResult::no_suitable_agent(TaskId::new());
        assert!(!result.success);
        assert!(result.agent_id.is_none());
        assert!(result.errors[0].contains("no suitable agent"));
    }

    #[test]
    fn negative_span_clamps_to_zero() {
        let start = Utc::now();
        let end = start - Duration::seconds(3);
        let result = TaskResult::failed(TaskId::new(), None, start, end, "clock skew", "skew");
        assert_eq!(result.duration_seconds, 0.0);
    }
}
