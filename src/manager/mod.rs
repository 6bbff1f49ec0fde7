//! Dispatch layer.
//!
//! - `manager`: `AgentManager`: agent registry, task/result tables, matching and batch execution
//! - `patterns`: Append-only success-pattern ledger
//! - `metrics`: Per-agent performance derived from state and results

#[allow(clippy::module_inception)]
pub mod manager;
pub mod metrics;
pub mod patterns;

pub use manager::AgentManager;
pub use metrics::AgentPerformance;
pub use patterns::{SuccessPattern, SuccessPatternLedger, pattern_key};
