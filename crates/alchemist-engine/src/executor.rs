//! Sequential task execution.
//!
//! One task at a time: resolve the transform, write outputs (staged locally
//! for S3 destinations), upload, notify. A failed task is counted and logged;
//! the loop never aborts on it.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::Utc;

use alchemist_types::error::{TaskFailure, TaskStage};
use alchemist_types::task::{Task, TaskReport};

use crate::notify::publish_task_done;
use crate::result::RunSummary;
use crate::transform::{self, TransformInput};
use crate::upload::Staging;

/// Name of the metadata document written next to every task's outputs.
pub const METADATA_FILE: &str = "metadata.json";

/// Task executor holding the optional cloud clients a run may need.
#[derive(Default)]
pub struct Executor {
    s3: Option<aws_sdk_s3::Client>,
    sns: Option<aws_sdk_sns::Client>,
    make_public: bool,
    staging_root: Option<PathBuf>,
}

impl Executor {
    /// Executor with no cloud clients; sufficient for local output locations.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an S3 client for `s3://` output locations.
    #[must_use]
    pub fn with_s3(mut self, client: aws_sdk_s3::Client) -> Self {
        self.s3 = Some(client);
        self
    }

    /// Attach an SNS client for completion notifications.
    #[must_use]
    pub fn with_sns(mut self, client: aws_sdk_sns::Client) -> Self {
        self.sns = Some(client);
        self
    }

    /// Upload outputs with a public-read ACL.
    #[must_use]
    pub fn with_make_public(mut self, make_public: bool) -> Self {
        self.make_public = make_public;
        self
    }

    /// Override the S3 staging directory (used by tests).
    #[must_use]
    pub fn with_staging_root(mut self, root: PathBuf) -> Self {
        self.staging_root = Some(root);
        self
    }

    /// Execute one task end to end.
    ///
    /// # Errors
    ///
    /// Returns a [`TaskFailure`] recording the stage that broke.
    pub async fn execute(&self, task: &Task) -> Result<TaskReport, TaskFailure> {
        let dataset_id = task.dataset.id;
        let fail = |stage: TaskStage| {
            move |e: anyhow::Error| {
                TaskFailure::new(stage, format!("{e:#}")).with_dataset(dataset_id)
            }
        };

        let spec = &task.settings.specification;
        let subdir = format!("{}/{}", task.dataset.product, dataset_id);

        let staging = Staging::prepare(
            &task.output_location,
            &subdir,
            self.staging_root.as_deref(),
        )
        .map_err(fail(TaskStage::Output))?;

        let transform = transform::resolve(&spec.transform).map_err(fail(TaskStage::Transform))?;

        tracing::info!(
            dataset = %dataset_id,
            product = task.dataset.product,
            transform = transform.id(),
            output = %staging.location(),
            "Executing task"
        );

        let input = TransformInput {
            dataset: &task.dataset,
            measurements: &spec.measurements,
            args: &spec.transform_args,
            output_dir: staging.work_root(),
        };
        let output = transform.apply(&input).map_err(fail(TaskStage::Transform))?;

        let mut written: Vec<String> = output
            .written
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        write_metadata_doc(task, transform.id(), &output.properties, staging.work_root())
            .map_err(fail(TaskStage::Output))?;
        written.push(METADATA_FILE.to_string());

        if staging.location().is_s3() {
            let s3 = self
                .s3
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("S3 output location but no S3 client configured"))
                .map_err(fail(TaskStage::Upload))?;
            staging
                .upload_if_needed(s3, self.make_public)
                .await
                .map_err(fail(TaskStage::Upload))?;
        }

        let report = TaskReport {
            dataset_id,
            product: task.dataset.product.clone(),
            transform: transform.id().to_string(),
            output_location: staging.location().to_string(),
            written,
        };

        // Best-effort: a failed notification never fails the task.
        if let Some(topic_arn) = &task.settings.notification.topic_arn {
            match &self.sns {
                Some(sns) => {
                    if let Err(e) = publish_task_done(sns, topic_arn, &report).await {
                        tracing::warn!(error = %e, topic = topic_arn, "Notification failed");
                    }
                }
                None => {
                    tracing::warn!(
                        topic = topic_arn,
                        "Notification configured but no SNS client attached; skipping"
                    );
                }
            }
        }

        Ok(report)
    }

    /// Execute tasks sequentially, counting successes and failures.
    pub async fn execute_all(&self, tasks: &[Task]) -> RunSummary {
        let started = Instant::now();
        let mut summary = RunSummary {
            generated: tasks.len(),
            ..RunSummary::default()
        };

        for task in tasks {
            match self.execute(task).await {
                Ok(report) => {
                    summary.succeeded += 1;
                    tracing::info!(
                        dataset = %report.dataset_id,
                        output = report.output_location,
                        "Task complete"
                    );
                }
                Err(failure) => {
                    summary.failed += 1;
                    tracing::error!(
                        dataset = ?failure.dataset_id,
                        stage = %failure.stage,
                        error = failure.message,
                        "Task failed"
                    );
                    summary.failures.push(failure);
                }
            }
        }

        summary.duration_secs = started.elapsed().as_secs_f64();
        summary
    }
}

/// Write the `metadata.json` document describing one task's outputs.
fn write_metadata_doc(
    task: &Task,
    transform_id: &str,
    transform_properties: &serde_json::Value,
    dir: &Path,
) -> Result<()> {
    let mut properties = serde_json::Map::new();
    if let serde_json::Value::Object(extra) = &task.settings.output.metadata {
        properties.extend(extra.clone());
    }
    if let serde_json::Value::Object(extra) = transform_properties {
        properties.extend(extra.clone());
    }

    let doc = serde_json::json!({
        "id": task.dataset.id,
        "product": task.dataset.product,
        "source_uri": task.dataset.primary_uri(),
        "transform": transform_id,
        "measurements": task.settings.specification.measurements,
        "dtype": task.settings.output.dtype,
        "nodata": task.settings.output.nodata,
        "software": {
            "name": "alchemist",
            "version": env!("CARGO_PKG_VERSION"),
        },
        "processed": Utc::now().to_rfc3339(),
        "properties": properties,
    });

    let path = dir.join(METADATA_FILE);
    let bytes = serde_json::to_vec_pretty(&doc).context("Failed to serialize metadata document")?;
    std::fs::write(&path, bytes)
        .with_context(|| format!("Failed to write '{}'", path.display()))?;
    Ok(())
}
