//! Ownership ledger: which entity IDs the orchestrator currently manages.

use std::collections::BTreeSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How much control the orchestrator claims over an agent. Recorded, not enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnershipLevel {
    #[default]
    Complete,
    Partial,
    Managed,
}

impl std::fmt::Display for OwnershipLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Complete => "complete",
            Self::Partial => "partial",
            Self::Managed => "managed",
        };
        write!(f, "{s}")
    }
}

impl FromStr for OwnershipLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "complete" => Ok(Self::Complete),
            "partial" => Ok(Self::Partial),
            "managed" => Ok(Self::Managed),
            other => Err(ConfigError::InvalidValue {
                key: "ownership_level".to_string(),
                message: format!("unknown ownership level '{other}'"),
            }),
        }
    }
}

/// The four ledger sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnershipKind {
    Agents,
    Tasks,
    Resources,
    Components,
}

/// Derived index of owned IDs. Never the source of truth for entity content.
#[derive(Debug, Clone, Default)]
pub struct OwnershipLedger {
    agents: BTreeSet<String>,
    tasks: BTreeSet<String>,
    resources: BTreeSet<String>,
    components: BTreeSet<String>,
}

impl OwnershipLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn set(&self, kind: OwnershipKind) -> &BTreeSet<String> {
        match kind {
            OwnershipKind::Agents => &self.agents,
            OwnershipKind::Tasks => &self.tasks,
            OwnershipKind::Resources => &self.resources,
            OwnershipKind::Components => &self.components,
        }
    }

    fn set_mut(&mut self, kind: OwnershipKind) -> &mut BTreeSet<String> {
        match kind {
            OwnershipKind::Agents => &mut self.agents,
            OwnershipKind::Tasks => &mut self.tasks,
            OwnershipKind::Resources => &mut self.resources,
            OwnershipKind::Components => &mut self.components,
        }
    }

    /// Returns false if the ID was already owned.
    pub fn insert(&mut self, kind: OwnershipKind, id: impl Into<String>) -> bool {
        self.set_mut(kind).insert(id.into())
    }

    /// Returns false if the ID was not owned.
    pub fn remove(&mut self, kind: OwnershipKind, id: &str) -> bool {
        self.set_mut(kind).remove(id)
    }

    pub fn contains(&self, kind: OwnershipKind, id: &str) -> bool {
        self.set(kind).contains(id)
    }

    pub fn count(&self, kind: OwnershipKind) -> usize {
        self.set(kind).len()
    }

    pub fn report(&self) -> OwnershipReport {
        OwnershipReport {
            num_agents: self.agents.len(),
            num_tasks: self.tasks.len(),
            num_resources: self.resources.len(),
            num_components: self.components.len(),
            total_owned: self.agents.len()
                + self.tasks.len()
                + self.resources.len()
                + self.components.len(),
            agents: self.agents.iter().cloned().collect(),
            tasks: self.tasks.iter().cloned().collect(),
            resources: self.resources.iter().cloned().collect(),
            components: self.components.iter().cloned().collect(),
        }
    }
}

/// Point-in-time snapshot of the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipReport {
    pub num_agents: usize,
    pub num_tasks: usize,
    pub num_resources: usize,
    pub num_components: usize,
    pub total_owned: usize,
    pub agents: Vec<String>,
    pub tasks: Vec<String>,
    pub resources: Vec<String>,
    pub components: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sets_are_independent() {
        let mut ledger = OwnershipLedger::new();
        assert!(ledger.insert(OwnershipKind::Agents, "a1"));
        assert!(!ledger.insert(OwnershipKind::Agents, "a1"));
        assert!(ledger.insert(OwnershipKind::Resources, "a1"));

        assert!(ledger.contains(OwnershipKind::Agents, "a1"));
        assert!(!ledger.contains(OwnershipKind::Tasks, "a1"));
        assert!(ledger.remove(OwnershipKind::Agents, "a1"));
        assert!(!ledger.remove(OwnershipKind::Agents, "a1"));
        assert!(ledger.contains(OwnershipKind::Resources, "a1"));
    }

    #[test]
    fn report_totals() {
        let mut ledger = OwnershipLedger::new();
        ledger.insert(OwnershipKind::Agents, "a1");
        ledger.insert(OwnershipKind::Agents, "a2");
        ledger.insert(OwnershipKind::Tasks, "t1");
        ledger.insert(OwnershipKind::Components, "ollama");

        let report = ledger.report();
        assert_eq!(report.num_agents, 2);
        assert_eq!(report.num_tasks, 1);
        assert_eq!(report.num_resources, 0);
        assert_eq!(report.num_components, 1);
        assert_eq!(report.total_owned, 4);
        assert_eq!(report.agents, vec!["a1", "a2"]);
        assert_eq!(report.components, vec!["ollama"]);
    }

    #[test]
    fn level_parsing() {
        assert_eq!("Partial".parse::<OwnershipLevel>().unwrap(), OwnershipLevel::Partial);
        assert_eq!(OwnershipLevel::default().to_string(), "complete");
        assert!("total".parse::<OwnershipLevel>().is_err());
    }
}
