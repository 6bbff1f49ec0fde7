//! Directory-backed `ContextStore`.
//!
//! The data directory contains:
//! - `templates/`, `patterns/`, `metrics/`: scaffolding for collaborators
//! - `logs/events.jsonl`: one JSON event per line, appended as they happen
//! - `contexts/global.json`: staged context blobs, written on flush

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::error::StorageError;
use crate::storage::traits::{ContextStore, SystemEvent};

/// Well-known paths under the data directory.
pub mod paths {
    pub const TEMPLATES: &str = "templates";
    pub const CONTEXTS: &str = "contexts";
    pub const LOGS: &str = "logs";
    pub const PATTERNS: &str = "patterns";
    pub const METRICS: &str = "metrics";
    pub const EVENT_LOG: &str = "logs/events.jsonl";
    pub const GLOBAL_CONTEXT: &str = "contexts/global.json";
}

const SCAFFOLD_DIRS: &[&str] = &[
    paths::TEMPLATES,
    paths::CONTEXTS,
    paths::LOGS,
    paths::PATTERNS,
    paths::METRICS,
];

pub struct FileStore {
    base_path: PathBuf,
    staged: RwLock<BTreeMap<String, serde_json::Value>>,
}

impl FileStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            staged: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Resolve a path relative to the data directory.
    pub fn resolve_path(&self, relative: &str) -> PathBuf {
        self.base_path.join(relative)
    }

    /// Read back every event in the log. Missing log means no events.
    pub async fn read_events(&self) -> Result<Vec<SystemEvent>, StorageError> {
        let path = self.resolve_path(paths::EVENT_LOG);
        let raw = match fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        raw.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(StorageError::from))
            .collect()
    }
}

#[async_trait]
impl ContextStore for FileStore {
    async fn prepare(&self) -> Result<(), StorageError> {
        for dir in SCAFFOLD_DIRS {
            fs::create_dir_all(self.resolve_path(dir)).await?;
        }
        tracing::debug!(path = %self.base_path.display(), "Prepared data directory");
        Ok(())
    }

    async fn record_event(&self, event: &SystemEvent) -> Result<(), StorageError> {
        let path = self.resolve_path(paths::EVENT_LOG);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut line = serde_json::to_string(event)?;
        line.push('\n');

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn save_context(&self, key: &str, value: serde_json::Value) -> Result<(), StorageError> {
        self.staged.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn flush(&self) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(&*self.staged.read().await)?;
        let path = self.resolve_path(paths::GLOBAL_CONTEXT);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, json).await?;
        tracing::debug!(path = %path.display(), "Flushed context");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn prepare_creates_scaffolding() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("fleet"));
        store.prepare().await.unwrap();

        for sub in SCAFFOLD_DIRS {
            assert!(store.resolve_path(sub).is_dir(), "missing {sub}");
        }
    }

    #[tokio::test]
    async fn events_append_as_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        assert!(store.read_events().await.unwrap().is_empty());

        store
            .record_event(&SystemEvent::new("system_start", "started"))
            .await
            .unwrap();
        store
            .record_event(&SystemEvent::new("system_stop", "stopped").with_meta("uptime_s", 1.5))
            .await
            .unwrap();

        let events = store.read_events().await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, "system_start");
        assert_eq!(events[1].metadata["uptime_s"], 1.5);
    }

    #[tokio::test]
    async fn flush_writes_global_context() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        store
            .save_context("ownership", serde_json::json!({"total_owned": 3}))
            .await
            .unwrap();
        store
            .save_context("ownership", serde_json::json!({"total_owned": 4}))
            .await
            .unwrap();
        store.flush().await.unwrap();

        let raw = std::fs::read_to_string(store.resolve_path(paths::GLOBAL_CONTEXT)).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed["ownership"]["total_owned"], 4);
    }
}
