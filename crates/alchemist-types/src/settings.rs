//! Job settings document parsed from the YAML configuration file.
//!
//! Settings are parsed once per run and embedded in every task, so a queued
//! task is self-contained when a worker picks it up later.

use serde::{Deserialize, Serialize};

/// Top-level job settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub version: String,
    pub specification: Specification,
    pub output: OutputSettings,
    #[serde(default)]
    pub processing: ProcessingSettings,
    #[serde(default)]
    pub queue: QueueSettings,
    #[serde(default)]
    pub notification: NotificationSettings,
}

/// What to read and which transform to apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Specification {
    /// Product (dataset type) to query from the index.
    pub product: String,
    /// Measurement (band) names handed to the transform.
    pub measurements: Vec<String>,
    /// Registry name of the transform to apply.
    pub transform: String,
    /// Free-form arguments forwarded to the transform verbatim.
    #[serde(default)]
    pub transform_args: serde_json::Value,
}

/// Where and how results are written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputSettings {
    /// `s3://bucket/prefix` or a local directory.
    pub location: String,
    #[serde(default = "default_dtype")]
    pub dtype: String,
    #[serde(default)]
    pub nodata: Option<f64>,
    /// Extra properties stamped into each output metadata document.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

fn default_dtype() -> String {
    "float32".to_string()
}

/// Run-level processing knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessingSettings {
    /// Optional global cap on the number of generated tasks.
    #[serde(default)]
    pub task_limit: Option<usize>,
}

impl Default for ProcessingSettings {
    fn default() -> Self {
        Self { task_limit: None }
    }
}

/// Default message queue wiring; the CLI may override the queue name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueueSettings {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_visibility_timeout")]
    pub visibility_timeout_secs: i32,
}

fn default_visibility_timeout() -> i32 {
    400
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            name: None,
            visibility_timeout_secs: default_visibility_timeout(),
        }
    }
}

/// Optional per-task completion notification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotificationSettings {
    /// SNS topic to publish to after each successful task.
    #[serde(default)]
    pub topic_arn: Option<String>,
}
