//! Error and validation model for orchestrator operations.
//!
//! [`TaskFailure`] is the serializable record of a failed task: which stage
//! broke and why. The executor counts and logs these without aborting a run.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stage of task processing at which a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
#[serde(rename_all = "snake_case")]
pub enum TaskStage {
    /// Loading or validating job configuration.
    Config,
    /// Querying the dataset index.
    Index,
    /// Resolving or applying the transform.
    Transform,
    /// Writing band outputs or the metadata document.
    Output,
    /// Copying staged results to object storage.
    Upload,
    /// Publishing the completion notification.
    Notify,
    /// Pushing to or pulling from the message queue.
    Queue,
}

impl fmt::Display for TaskStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Config => "config",
            Self::Index => "index",
            Self::Transform => "transform",
            Self::Output => "output",
            Self::Upload => "upload",
            Self::Notify => "notify",
            Self::Queue => "queue",
        };
        f.write_str(s)
    }
}

/// Record of a single failed task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("[{stage}] {message}")]
pub struct TaskFailure {
    pub stage: TaskStage,
    pub message: String,
    /// Dataset the task was processing, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_id: Option<crate::dataset::DatasetId>,
}

impl TaskFailure {
    /// Build a failure record for the given stage.
    #[must_use]
    pub fn new(stage: TaskStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            dataset_id: None,
        }
    }

    /// Attach the dataset the task was processing.
    #[must_use]
    pub fn with_dataset(mut self, id: crate::dataset::DatasetId) -> Self {
        self.dataset_id = Some(id);
        self
    }
}

/// Outcome of a single check-command probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Success,
    Failed,
    Skipped,
}

/// Result of one check-command probe, with an operator-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub status: ValidationStatus,
    pub message: String,
}

impl ValidationResult {
    /// Successful probe.
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: ValidationStatus::Success,
            message: message.into(),
        }
    }

    /// Failed probe.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: ValidationStatus::Failed,
            message: message.into(),
        }
    }

    /// Probe that did not apply (e.g. no queue configured).
    #[must_use]
    pub fn skipped(message: impl Into<String>) -> Self {
        Self {
            status: ValidationStatus::Skipped,
            message: message.into(),
        }
    }

    /// `true` unless the probe failed.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status != ValidationStatus::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::DatasetId;
    use uuid::Uuid;

    #[test]
    fn display_format() {
        let f = TaskFailure::new(TaskStage::Transform, "unknown transform 'wofs'");
        assert_eq!(f.to_string(), "[transform] unknown transform 'wofs'");
    }

    #[test]
    fn with_dataset_attaches_id() {
        let id = DatasetId::new(Uuid::nil());
        let f = TaskFailure::new(TaskStage::Upload, "put failed").with_dataset(id);
        assert_eq!(f.dataset_id, Some(id));
    }

    #[test]
    fn serde_roundtrip() {
        let f = TaskFailure::new(TaskStage::Queue, "send timed out")
            .with_dataset(DatasetId::new(Uuid::nil()));
        let json = serde_json::to_string(&f).unwrap();
        let back: TaskFailure = serde_json::from_str(&json).unwrap();
        assert_eq!(f, back);
    }

    #[test]
    fn stage_serializes_snake_case() {
        let json = serde_json::to_string(&TaskStage::Output).unwrap();
        assert_eq!(json, "\"output\"");
    }

    #[test]
    fn validation_result_is_ok() {
        assert!(ValidationResult::success("fine").is_ok());
        assert!(ValidationResult::skipped("no queue configured").is_ok());
        assert!(!ValidationResult::failed("boom").is_ok());
    }
}
