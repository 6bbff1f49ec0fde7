//! Orchestrator layer over the agent manager.
//!
//! - `master`: `MasterPlayer` façade: lifecycle, mirrored registries, collaborators
//! - `ownership`: Ownership ledger and report

pub mod master;
pub mod ownership;

pub use master::{AgentRecord, MasterPlayer, RecordStatus, TaskRecord, TaskRequest};
pub use ownership::{OwnershipKind, OwnershipLedger, OwnershipLevel, OwnershipReport};
