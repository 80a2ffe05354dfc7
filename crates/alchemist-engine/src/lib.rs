//! Orchestration engine: config loading, dataset index access, task
//! generation and execution, the SQS queue bridge, and S3 staging.

pub mod config;
pub mod executor;
pub mod generate;
pub mod index;
pub mod notify;
pub mod queue;
pub mod result;
pub mod transform;
pub mod upload;

// Re-export the operations the CLI wires together.
pub use config::{load_settings, validate_settings};
pub use executor::Executor;
pub use generate::{generate_task, generate_tasks};
pub use result::{CheckReport, RunSummary};
