//! Storage contract.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// A timestamped event with a type and free-form metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemEvent {
    pub event_type: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl SystemEvent {
    pub fn new(event_type: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            description: description.into(),
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    /// Builder: add a metadata entry.
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Receives events and opaque context blobs from the orchestrator.
#[async_trait]
pub trait ContextStore: Send + Sync {
    /// Create whatever scaffolding the store needs. Called on start.
    async fn prepare(&self) -> Result<(), StorageError>;

    /// Record a significant event.
    async fn record_event(&self, event: &SystemEvent) -> Result<(), StorageError>;

    /// Stage a context blob under `key`, replacing any earlier value.
    async fn save_context(&self, key: &str, value: serde_json::Value) -> Result<(), StorageError>;

    /// Persist everything staged so far. Called on stop.
    async fn flush(&self) -> Result<(), StorageError>;
}
