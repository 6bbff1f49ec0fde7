//! In-memory `ContextStore`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StorageError;
use crate::storage::traits::{ContextStore, SystemEvent};

/// Keeps everything in process. Useful for tests and for embedding the
/// orchestrator without touching disk.
#[derive(Default)]
pub struct MemoryStore {
    events: RwLock<Vec<SystemEvent>>,
    contexts: RwLock<HashMap<String, serde_json::Value>>,
    prepared: AtomicBool,
    flushes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<SystemEvent> {
        self.events.read().await.clone()
    }

    pub async fn context(&self, key: &str) -> Option<serde_json::Value> {
        self.contexts.read().await.get(key).cloned()
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared.load(Ordering::Acquire)
    }

    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::Acquire)
    }
}

#[async_trait]
impl ContextStore for MemoryStore {
    async fn prepare(&self) -> Result<(), StorageError> {
        self.prepared.store(true, Ordering::Release);
        Ok(())
    }

    async fn record_event(&self, event: &SystemEvent) -> Result<(), StorageError> {
        self.events.write().await.push(event.clone());
        Ok(())
    }

    async fn save_context(&self, key: &str, value: serde_json::Value) -> Result<(), StorageError> {
        self.contexts.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn flush(&self) -> Result<(), StorageError> {
        self.flushes.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_events_and_contexts() {
        let store = MemoryStore::new();
        assert!(!store.is_prepared());
        store.prepare().await.unwrap();
        assert!(store.is_prepared());

        store
            .record_event(&SystemEvent::new("system_start", "up").with_meta("n", 1))
            .await
            .unwrap();
        store
            .save_context("ownership", serde_json::json!({"agents": 2}))
            .await
            .unwrap();
        store.flush().await.unwrap();

        let events = store.events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].metadata["n"], 1);
        assert_eq!(store.context("ownership").await.unwrap()["agents"], 2);
        assert_eq!(store.flush_count(), 1);
    }
}
