//! Unit of work pairing one dataset with the job settings.

use serde::{Deserialize, Serialize};

use crate::dataset::{DatasetDoc, DatasetId};
use crate::settings::Settings;

/// Fallback queue-message body for datasets with no recorded location.
pub const LOCATION_NOT_KNOWN: &str = "location not known";

/// One unit of work: a dataset plus the settings in force when the task was
/// generated. Immutable once created; lifecycle is create, optionally
/// serialize to the queue, execute, discard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub dataset: DatasetDoc,
    /// Settings snapshot embedded so a queued task is self-contained.
    pub settings: Settings,
    /// Resolved output location for this task (settings location at
    /// generation time; rewritten to a staging directory by queue workers).
    pub output_location: String,
}

impl Task {
    /// Pair a dataset with the current settings.
    #[must_use]
    pub fn new(dataset: DatasetDoc, settings: Settings) -> Self {
        let output_location = settings.output.location.clone();
        Self {
            dataset,
            settings,
            output_location,
        }
    }

    /// Best-effort human-readable location for queue message bodies.
    #[must_use]
    pub fn display_location(&self) -> &str {
        self.dataset.primary_uri().unwrap_or(LOCATION_NOT_KNOWN)
    }
}

/// Summary of one completed task, published as the notification payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskReport {
    pub dataset_id: DatasetId,
    pub product: String,
    pub transform: String,
    pub output_location: String,
    /// Paths written, relative to the output location.
    pub written: Vec<String>,
}
