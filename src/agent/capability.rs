//! Capability tags used to match tasks to agents.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A named skill an agent offers and a task may require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    TaskPlanning,
    CodeGeneration,
    FileOperations,
    DataAnalysis,
    SystemAdministration,
    WebSearch,
    TextProcessing,
}

impl Capability {
    pub const ALL: [Capability; 7] = [
        Self::TaskPlanning,
        Self::CodeGeneration,
        Self::FileOperations,
        Self::DataAnalysis,
        Self::SystemAdministration,
        Self::WebSearch,
        Self::TextProcessing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TaskPlanning => "task_planning",
            Self::CodeGeneration => "code_generation",
            Self::FileOperations => "file_operations",
            Self::DataAnalysis => "data_analysis",
            Self::SystemAdministration => "system_administration",
            Self::WebSearch => "web_search",
            Self::TextProcessing => "text_processing",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|cap| cap.as_str() == normalized)
            .ok_or_else(|| ConfigError::InvalidValue {
                key: "capability".to_string(),
                message: format!("unknown capability '{s}'"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_loose_spelling() {
        assert_eq!(
            "code-generation".parse::<Capability>().unwrap(),
            Capability::CodeGeneration
        );
        assert_eq!(
            "WEB_SEARCH".parse::<Capability>().unwrap(),
            Capability::WebSearch
        );
        assert!("teleportation".parse::<Capability>().is_err());
    }

    #[test]
    fn display_matches_serde() {
        for cap in Capability::ALL {
            let json = serde_json::to_string(&cap).unwrap();
            assert_eq!(json, format!("\"{cap}\""));
        }
    }
}
