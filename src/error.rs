//! Error types for the agent fleet.

use crate::agent::AgentId;
use crate::task::{TaskId, TaskStatus};

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Task error: {0}")]
    Task(#[from] TaskError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Agent and task registry errors.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Agent {id} not registered")]
    AgentNotFound { id: AgentId },

    #[error("Agent {id} already registered")]
    DuplicateAgent { id: AgentId },

    #[error("Task {id} not registered")]
    TaskNotFound { id: TaskId },

    #[error("Maximum number of agents ({max}) reached")]
    CapacityReached { max: usize },
}

/// Task lifecycle errors.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("Task {} is {from}, cannot transition to {to}", task_label(.id))]
    InvalidTransition {
        /// `None` for a task that has not been assigned an ID yet.
        id: Option<TaskId>,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error("Task {id} is already in progress")]
    AlreadyRunning { id: TaskId },
}

fn task_label(id: &Option<TaskId>) -> String {
    id.map(|id| id.to_string())
        .unwrap_or_else(|| "<unassigned>".to_string())
}

/// Storage collaborator errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_transition_names_the_task() {
        let id = TaskId::new();
        let err = TaskError::InvalidTransition {
            id: Some(id),
            from: TaskStatus::Completed,
            to: TaskStatus::InProgress,
        };
        assert_eq!(
            err.to_string(),
            format!("Task {id} is completed, cannot transition to in_progress")
        );

        let err = TaskError::InvalidTransition {
            id: None,
            from: TaskStatus::Pending,
            to: TaskStatus::Completed,
        };
        assert!(err.to_string().starts_with("Task <unassigned> is pending"));
    }
}
