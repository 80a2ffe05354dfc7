use anyhow::Result;
use aws_config::BehaviorVersion;

use alchemist_engine::queue::QueueBridge;

/// Execute the `redrive-to-queue` command: move messages (task attributes
/// preserved) from one queue to another until the source is empty.
pub async fn execute(from_queue: &str, to_queue: &str, limit: Option<usize>) -> Result<()> {
    let aws = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let bridge = QueueBridge::new(aws_sdk_sqs::Client::new(&aws));

    let source_url = bridge.queue_url(from_queue).await?;
    let dest_url = bridge.queue_url(to_queue).await?;

    let moved = bridge.redrive(&source_url, &dest_url, limit).await?;
    println!("Moved {moved} message(s) from '{from_queue}' to '{to_queue}'.");
    Ok(())
}
