//! Task handlers: the per-agent work step.
//!
//! `Agent::execute` owns every state transition around a run; a handler only
//! does the task-specific work and reports an outcome or a failure.

use async_trait::async_trait;

use crate::task::{Task, TaskOutcome};

/// Failure raised by a handler's work step.
#[derive(Debug, Clone, thiserror::Error)]
pub enum HandlerError {
    #[error("{0}")]
    Failed(String),

    #[error("Missing input {field}: {reason}")]
    MissingInput { field: String, reason: String },

    #[error("Handler panicked: {0}")]
    Panicked(String),
}

impl HandlerError {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }
}

/// The work an agent performs for a task.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Short label for logs.
    fn kind(&self) -> &str {
        "handler"
    }

    /// Perform the task-specific work.
    async fn perform(&self, task: &Task) -> Result<TaskOutcome, HandlerError>;
}

/// Default handler: walks the subtask list and reports each one as done.
#[derive(Debug, Default, Clone, Copy)]
pub struct SubtaskHandler;

#[async_trait]
impl TaskHandler for SubtaskHandler {
    fn kind(&self) -> &str {
        "subtasks"
    }

    async fn perform(&self, task: &Task) -> Result<TaskOutcome, HandlerError> {
        let completed: Vec<String> = task
            .subtasks
            .iter()
            .map(|subtask| format!("Completed subtask: {}", subtask.name))
            .collect();

        Ok(TaskOutcome::new(format!("Executed task: {}", task.name))
            .with_details(format!(
                "Task {} executed successfully with {} subtasks.",
                task.name,
                completed.len()
            ))
            .with_artifact("subtasks_completed", serde_json::json!(completed)))
    }
}
