//! Task completion notifications.
//!
//! Publishing is best-effort: a failed publish is logged and reported to the
//! caller's counters but never fails the task that produced the output.

use anyhow::{Context, Result};

use alchemist_types::task::TaskReport;

/// Publish a completed-task report to an SNS topic.
///
/// # Errors
///
/// Returns an error if the report cannot be serialized or the publish call
/// fails; callers treat this as non-fatal.
pub async fn publish_task_done(
    sns: &aws_sdk_sns::Client,
    topic_arn: &str,
    report: &TaskReport,
) -> Result<()> {
    let message =
        serde_json::to_string(report).context("Failed to serialize task report")?;

    sns.publish()
        .topic_arn(topic_arn)
        .subject(format!("alchemist: {} complete", report.product))
        .message(message)
        .send()
        .await
        .with_context(|| format!("Failed to publish notification to '{topic_arn}'"))?;

    tracing::info!(
        topic = topic_arn,
        dataset = %report.dataset_id,
        "Published completion notification"
    );
    Ok(())
}
