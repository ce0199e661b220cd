//! Types shared across the IPET/ILP/transform subsystems.
//!
//! Has zero dependency on the orchestrator or any single subsystem, so any of
//! `ilp`, `ipet`, `flowfacts`, `transform` can use it without a cycle.

pub mod models;

pub use models::*;
