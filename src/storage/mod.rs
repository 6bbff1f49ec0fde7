//! Storage collaborator: where the orchestrator sends events and context blobs.
//!
//! - `traits`: The `ContextStore` contract and `SystemEvent`
//! - `memory`: In-process store (tests, embedding)
//! - `file`: Directory-backed store with JSONL event log

pub mod file;
pub mod memory;
pub mod traits;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use traits::{ContextStore, SystemEvent};
