//! Shared dataset, task, settings, and error model types for the alchemist
//! orchestrator.
//!
//! Everything here is plain serde data: the engine and CLI crates depend on
//! this crate without pulling in any I/O.

pub mod dataset;
pub mod error;
pub mod expression;
pub mod settings;
pub mod task;
