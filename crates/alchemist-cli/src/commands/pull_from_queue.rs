use std::path::Path;

use anyhow::{Context, Result};
use aws_config::BehaviorVersion;

use alchemist_engine::config;
use alchemist_engine::queue::QueueBridge;

/// Execute the `pull-from-queue` command: receive one task, run it, upload
/// the results, and delete the message only after success. A failed task
/// leaves the message in flight so the visibility timeout redelivers it.
pub async fn execute(
    config_file: &Path,
    message_queue: Option<&str>,
    sqs_timeout: Option<i32>,
    make_public: bool,
) -> Result<()> {
    let settings = config::load_settings(config_file)
        .with_context(|| format!("Failed to load settings: {}", config_file.display()))?;
    config::validate_settings(&settings)?;

    let queue_name = super::resolve_queue_name(message_queue, &settings)?;
    let visibility_timeout =
        sqs_timeout.unwrap_or(settings.queue.visibility_timeout_secs);

    let aws = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let bridge = QueueBridge::new(aws_sdk_sqs::Client::new(&aws));
    let queue_url = bridge.queue_url(queue_name).await?;

    let Some(pulled) = bridge.pull_task(&queue_url, visibility_timeout).await? else {
        tracing::warn!(queue = queue_name, "No messages");
        println!("Queue '{queue_name}' is empty.");
        return Ok(());
    };

    tracing::info!(
        dataset = %pulled.task.dataset.id,
        product = pulled.task.dataset.product,
        "Pulled task from queue"
    );

    // The task's embedded settings drive execution; the pulling host's
    // config file only supplies queue wiring.
    super::execute_single(&pulled.task, make_public).await?;

    bridge
        .delete_message(&queue_url, &pulled.receipt_handle)
        .await?;
    tracing::info!("SQS message deleted");
    Ok(())
}
