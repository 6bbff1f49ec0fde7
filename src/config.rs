//! Configuration types.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::orchestrator::OwnershipLevel;
use crate::task::{Horizon, Priority};

/// Orchestrator configuration.
///
/// Every field has a default, so a config file only needs the keys it
/// wants to change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Maximum number of agents the orchestrator will register.
    pub max_agents: usize,
    /// Priority applied to tasks created without one.
    pub default_priority: Priority,
    /// Horizon applied to tasks created without one.
    pub default_horizon: Horizon,
    /// Ownership tag recorded for agents registered without one.
    pub ownership_level: OwnershipLevel,
    /// Root directory for on-disk scaffolding, logs and exports.
    pub data_dir: PathBuf,
    /// Default tracing filter for the binary.
    pub log_level: String,
    /// Number of recent events the orchestrator keeps in memory.
    pub event_log_capacity: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_agents: 10,
            default_priority: Priority::Medium,
            default_horizon: Horizon::H1,
            ownership_level: OwnershipLevel::Complete,
            data_dir: default_data_dir(),
            log_level: "info".to_string(),
            event_log_capacity: 256,
        }
    }
}

fn default_data_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(|home| PathBuf::from(home).join(".agent-fleet"))
        .unwrap_or_else(|| PathBuf::from("./data/agent-fleet"))
}

impl OrchestratorConfig {
    /// Load a JSON config file merged over the defaults.
    ///
    /// No path, or a path that does not exist, yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            tracing::info!("No configuration file given, using defaults");
            return Ok(Self::default());
        };

        if !path.exists() {
            tracing::info!(path = %path.display(), "Configuration file not found, using defaults");
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let config: Self =
            serde_json::from_str(&raw).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;

        tracing::info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Apply `AGENT_FLEET_*` environment overrides.
    pub fn from_env(mut self) -> Result<Self, ConfigError> {
        if let Ok(dir) = std::env::var("AGENT_FLEET_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Ok(level) = std::env::var("AGENT_FLEET_LOG") {
            self.log_level = level;
        }
        if let Ok(max) = std::env::var("AGENT_FLEET_MAX_AGENTS") {
            self.max_agents = max.parse().map_err(|_| ConfigError::InvalidValue {
                key: "AGENT_FLEET_MAX_AGENTS".to_string(),
                message: format!("'{max}' is not a number"),
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_agents == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_agents".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.max_agents, 10);
        assert_eq!(config.default_priority, Priority::Medium);
        assert_eq!(config.default_horizon, Horizon::H1);
        assert_eq!(config.ownership_level, OwnershipLevel::Complete);
        assert_eq!(config.event_log_capacity, 256);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn load_without_path_or_file() {
        assert_eq!(
            OrchestratorConfig::load(None).unwrap(),
            OrchestratorConfig::default()
        );
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        assert_eq!(
            OrchestratorConfig::load(Some(&missing)).unwrap(),
            OrchestratorConfig::default()
        );
    }

    #[test]
    fn load_merges_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"max_agents": 3, "default_priority": "HIGH", "default_horizon": "H2"}"#,
        )
        .unwrap();

        let config = OrchestratorConfig::load(Some(&path)).unwrap();
        assert_eq!(config.max_agents, 3);
        assert_eq!(config.default_priority, Priority::High);
        assert_eq!(config.default_horizon, Horizon::H2);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn load_rejects_bad_json_and_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            OrchestratorConfig::load(Some(&path)),
            Err(ConfigError::ParseError(_))
        ));

        std::fs::write(&path, r#"{"max_agents": 0}"#).unwrap();
        assert!(matches!(
            OrchestratorConfig::load(Some(&path)),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
