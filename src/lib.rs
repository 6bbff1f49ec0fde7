//! Agent fleet: capability-matched task dispatch over a pool of agents.

pub mod agent;
pub mod analytics;
pub mod config;
pub mod error;
pub mod manager;
pub mod orchestrator;
pub mod storage;
pub mod task;
