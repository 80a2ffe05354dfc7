use std::path::Path;

use anyhow::{Context, Result};
use aws_config::BehaviorVersion;

use alchemist_engine::config;
use alchemist_engine::generate;
use alchemist_engine::index::PgIndex;
use alchemist_engine::queue::QueueBridge;
use alchemist_types::expression::parse_expressions;

/// Execute the `add-to-queue` command: generate tasks and push them to the
/// message queue for distributed workers.
pub async fn execute(
    config_file: &Path,
    expressions: &[String],
    message_queue: Option<&str>,
    environment: Option<&str>,
    limit: Option<usize>,
) -> Result<()> {
    let settings = config::load_settings(config_file)
        .with_context(|| format!("Failed to load settings: {}", config_file.display()))?;
    config::validate_settings(&settings)?;

    let queue_name = super::resolve_queue_name(message_queue, &settings)?;
    let expressions = parse_expressions(expressions)?;

    let index = PgIndex::connect(environment).await?;
    let tasks = generate::generate_tasks(&index, &settings, &expressions, limit).await?;

    if tasks.is_empty() {
        println!("No datasets matched the search expressions; nothing queued.");
        return Ok(());
    }

    let aws = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let bridge = QueueBridge::new(aws_sdk_sqs::Client::new(&aws));
    let queue_url = bridge.queue_url(queue_name).await?;

    let pushed = bridge.push_tasks(&queue_url, &tasks).await?;
    println!("Pushed {pushed} task(s) to queue '{queue_name}'.");
    Ok(())
}
