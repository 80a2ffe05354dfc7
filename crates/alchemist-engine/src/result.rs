//! Run and check result types.

use alchemist_types::error::{TaskFailure, ValidationResult};

/// Outcome of a sequential run over generated tasks.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub generated: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub duration_secs: f64,
    /// One record per failed task, in execution order.
    pub failures: Vec<TaskFailure>,
}

impl RunSummary {
    /// `true` when every generated task succeeded.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// Outcome of the `check` command probes.
#[derive(Debug)]
pub struct CheckReport {
    pub settings: ValidationResult,
    pub index: ValidationResult,
    pub transform: ValidationResult,
    pub queue: ValidationResult,
}

impl CheckReport {
    /// `true` when no probe failed (skipped probes count as passing).
    #[must_use]
    pub fn all_ok(&self) -> bool {
        self.settings.is_ok() && self.index.is_ok() && self.transform.is_ok() && self.queue.is_ok()
    }
}
