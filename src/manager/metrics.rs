//! Per-agent performance metrics, derived on demand.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::agent::{AgentId, AgentState, Capability};
use crate::task::{TaskId, TaskResult};

/// Read-side summary of one agent's track record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentPerformance {
    pub agent_id: AgentId,
    pub agent_name: String,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
    /// completed / (completed + failed), 0 before the first task.
    pub success_rate: f64,
    /// Mean duration of this agent's successful results, 0 if none.
    pub avg_duration: f64,
    pub capabilities: Vec<Capability>,
}

impl AgentPerformance {
    pub fn derive(state: &AgentState, results: &HashMap<TaskId, TaskResult>) -> Self {
        let completed = state.completed_tasks.len();
        let failed = state.failed_tasks.len();
        let total = completed + failed;

        let success_rate = if total > 0 {
            completed as f64 / total as f64
        } else {
            0.0
        };

        let completed_ids: HashSet<&TaskId> = state.completed_tasks.iter().collect();
        let durations: Vec<f64> = results
            .values()
            .filter(|r| {
                r.success
                    && r.agent_id == Some(state.agent_id)
                    && completed_ids.contains(&r.task_id)
            })
            .map(|r| r.duration_seconds)
            .collect();

        let avg_duration = if durations.is_empty() {
            0.0
        } else {
            durations.iter().sum::<f64>() / durations.len() as f64
        };

        Self {
            agent_id: state.agent_id,
            agent_name: state.name.clone(),
            total_tasks: total,
            completed_tasks: completed,
            failed_tasks: failed,
            success_rate,
            avg_duration,
            capabilities: state.capabilities.iter().copied().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskOutcome;
    use chrono::{Duration, Utc};
    use std::collections::BTreeSet;

    #[test]
    fn idle_agent_has_zero_metrics() {
        let state = AgentState::new(
            AgentId::new(),
            "Idle",
            BTreeSet::from([Capability::WebSearch]),
        );
        let perf = AgentPerformance::derive(&state, &HashMap::new());

        assert_eq!(perf.total_tasks, 0);
        assert_eq!(perf.success_rate, 0.0);
        assert_eq!(perf.avg_duration, 0.0);
        assert_eq!(perf.capabilities, vec![Capability::WebSearch]);
    }

    #[test]
    fn rate_and_average() {
        let agent_id = AgentId::new();
        let mut state = AgentState::new(agent_id, "Worker", BTreeSet::new());
        let mut results = HashMap::new();
        let start = Utc::now();

        for secs in [2, 4] {
            let task_id = TaskId::new();
            state.record_completed(task_id);
            results.insert(
                task_id,
                TaskResult::succeeded(
                    task_id,
                    agent_id,
                    start,
                    start + Duration::seconds(secs),
                    TaskOutcome::new("ok"),
                ),
            );
        }
        let failed_id = TaskId::new();
        state.record_failed(failed_id);
        results.insert(
            failed_id,
            TaskResult::failed(failed_id, Some(agent_id), start, start, "bad", "bad"),
        );

        // Another agent's result must not leak into the average
        let foreign = TaskId::new();
        results.insert(
            foreign,
            TaskResult::succeeded(
                foreign,
                AgentId::new(),
                start,
                start + Duration::seconds(100),
                TaskOutcome::new("other"),
            ),
        );

        let perf = AgentPerformance::derive(&state, &results);
        assert_eq!(perf.total_tasks, 3);
        assert_eq!(perf.completed_tasks, 2);
        assert_eq!(perf.failed_tasks, 1);
        assert!((perf.success_rate - 2.0 / 3.0).abs() < 1e-9);
        assert!((perf.avg_duration - 3.0).abs() < 1e-9);
    }
}
