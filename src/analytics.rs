//! Pattern-analytics collaborator.
//!
//! On every successful execution the orchestrator hands a `SuccessRecord`
//! to a `PatternSink`. The sink only receives; nothing flows back.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::agent::Capability;
use crate::error::StorageError;
use crate::task::{Task, TaskResult};

/// What the analytics sink learns about one successful execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessRecord {
    pub category: String,
    pub prompt: String,
    pub summary: String,
    pub metadata: HashMap<String, serde_json::Value>,
    pub recorded_at: DateTime<Utc>,
}

impl SuccessRecord {
    pub fn from_execution(task: &Task, result: &TaskResult) -> Self {
        let mut metadata = HashMap::new();
        metadata.insert("task_id".to_string(), result.task_id.to_string().into());
        metadata.insert("duration_seconds".to_string(), result.duration_seconds.into());
        if let Some(agent_id) = result.agent_id {
            metadata.insert("agent_id".to_string(), agent_id.to_string().into());
        }
        metadata.insert("priority".to_string(), task.priority.to_string().into());
        metadata.insert("horizon".to_string(), task.horizon.to_string().into());

        Self {
            category: analytics_category(task).to_string(),
            prompt: render_prompt(task),
            summary: result.summary.clone(),
            metadata,
            recorded_at: Utc::now(),
        }
    }
}

/// Coarse category for analytics: planning wins over code generation.
pub fn analytics_category(task: &Task) -> &'static str {
    let caps = &task.capabilities_required;
    if caps.contains(&Capability::TaskPlanning) {
        "task_planning"
    } else if caps.contains(&Capability::CodeGeneration) {
        "code_generation"
    } else {
        "general"
    }
}

/// Render the task as the prompt text the sink stores.
pub fn render_prompt(task: &Task) -> String {
    let capabilities = if task.capabilities_required.is_empty() {
        "none".to_string()
    } else {
        task.capabilities_required
            .iter()
            .map(Capability::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    };

    let description = task.description.as_deref().unwrap_or("No description");

    format!(
        "Task: {}\nDescription: {}\nPriority: {}\nHorizon: {}\nCapabilities: {}",
        task.name, description, task.priority, task.horizon, capabilities
    )
}

/// Receives success records.
#[async_trait]
pub trait PatternSink: Send + Sync {
    async fn record_success(&self, record: SuccessRecord);

    /// Persist anything buffered. Called on stop.
    async fn flush(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

/// Keeps success records in memory and optionally exports them as JSON.
#[derive(Default)]
pub struct PatternLog {
    records: RwLock<Vec<SuccessRecord>>,
    export_path: Option<PathBuf>,
}

impl PatternLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: write all records to `path` on flush.
    pub fn with_export(mut self, path: impl Into<PathBuf>) -> Self {
        self.export_path = Some(path.into());
        self
    }

    pub async fn records(&self) -> Vec<SuccessRecord> {
        self.records.read().await.clone()
    }

    pub async fn by_category(&self, category: &str) -> Vec<SuccessRecord> {
        self.records
            .read()
            .await
            .iter()
            .filter(|r| r.category == category)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl PatternSink for PatternLog {
    async fn record_success(&self, record: SuccessRecord) {
        tracing::debug!(category = %record.category, "Recorded success");
        self.records.write().await.push(record);
    }

    async fn flush(&self) -> Result<(), StorageError> {
        let Some(path) = &self.export_path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(&*self.records.read().await)?;
        tokio::fs::write(path, json).await?;
        tracing::debug!(path = %path.display(), "Exported success records");
        Ok(())
    }
}
