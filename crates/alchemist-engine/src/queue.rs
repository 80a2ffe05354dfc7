//! SQS queue bridge.
//!
//! Tasks travel as message attributes: the body is a best-effort dataset
//! location for operators reading the console, and the `task` binary
//! attribute carries the JSON-serialized task. The queue service owns
//! delivery semantics (at-least-once, visibility timeouts); nothing here
//! enforces ordering or uniqueness.

use std::ops::Range;

use anyhow::{bail, Context, Result};
use aws_sdk_sqs::primitives::Blob;
use aws_sdk_sqs::types::{
    DeleteMessageBatchRequestEntry, Message, MessageAttributeValue, SendMessageBatchRequestEntry,
};

use alchemist_types::task::Task;

/// Message attribute holding the serialized task.
pub const TASK_ATTRIBUTE: &str = "task";

/// SQS caps one `SendMessageBatch` call at 262,144 bytes; we flush well
/// before that because the estimate ignores attribute envelope overhead.
const BATCH_FLUSH_BYTES: usize = 180_000;
const BATCH_MAX_ENTRIES: usize = 10;
const PUSH_LOG_INTERVAL: usize = 100;

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// A task encoded for transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedTask {
    /// Message body: first dataset URI or a fallback marker.
    pub body: String,
    /// JSON bytes for the `task` binary attribute.
    pub payload: Vec<u8>,
}

impl EncodedTask {
    fn estimated_size(&self) -> usize {
        self.body.len() + self.payload.len() + TASK_ATTRIBUTE.len()
    }
}

/// Serialize a task for the queue.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode_task(task: &Task) -> Result<EncodedTask> {
    let payload = serde_json::to_vec(task).context("Failed to serialize task")?;
    Ok(EncodedTask {
        body: task.display_location().to_string(),
        payload,
    })
}

/// Deserialize a task pulled from the queue.
///
/// # Errors
///
/// Returns an error if the payload is not a valid task document.
pub fn decode_task(payload: &[u8]) -> Result<Task> {
    serde_json::from_slice(payload).context("Failed to deserialize task from queue message")
}

/// Split encoded tasks into batch spans honoring the entry-count and byte
/// limits. An oversized single task still gets its own span; the service
/// rejects it with a useful error rather than us silently dropping it.
fn batch_spans(encoded: &[EncodedTask]) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut start = 0usize;
    let mut bytes = 0usize;

    for (i, task) in encoded.iter().enumerate() {
        let size = task.estimated_size();
        let full = i - start >= BATCH_MAX_ENTRIES || (i > start && bytes + size > BATCH_FLUSH_BYTES);
        if full {
            spans.push(start..i);
            start = i;
            bytes = 0;
        }
        bytes += size;
    }
    if start < encoded.len() {
        spans.push(start..encoded.len());
    }
    spans
}

fn task_attribute(payload: Vec<u8>) -> Result<MessageAttributeValue> {
    MessageAttributeValue::builder()
        .data_type("Binary")
        .binary_value(Blob::new(payload))
        .build()
        .context("Failed to build task message attribute")
}

/// Extract and decode the task attribute from a received message.
///
/// # Errors
///
/// Returns an error when the attribute is missing or undecodable.
pub fn task_from_message(message: &Message) -> Result<Task> {
    let payload = message
        .message_attributes()
        .and_then(|attrs| attrs.get(TASK_ATTRIBUTE))
        .and_then(|attr| attr.binary_value())
        .context("Queue message has no task attribute")?;
    decode_task(payload.as_ref())
}

// ---------------------------------------------------------------------------
// Bridge
// ---------------------------------------------------------------------------

/// A task pulled from the queue, with the handle needed to delete it after
/// successful execution.
#[derive(Debug)]
pub struct PulledTask {
    pub task: Task,
    pub receipt_handle: String,
}

/// Thin wrapper over the SQS client for task traffic.
pub struct QueueBridge {
    client: aws_sdk_sqs::Client,
}

impl QueueBridge {
    #[must_use]
    pub fn new(client: aws_sdk_sqs::Client) -> Self {
        Self { client }
    }

    /// Resolve a queue name to its URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue does not exist.
    pub async fn queue_url(&self, name: &str) -> Result<String> {
        let out = self
            .client
            .get_queue_url()
            .queue_name(name)
            .send()
            .await
            .with_context(|| format!("Failed to resolve queue '{name}'"))?;
        out.queue_url()
            .map(str::to_string)
            .with_context(|| format!("Queue '{name}' has no URL"))
    }

    /// Push tasks in size-capped batches. Returns the number pushed.
    ///
    /// # Errors
    ///
    /// Returns an error on the first batch the service rejects, naming how
    /// many entries failed.
    pub async fn push_tasks(&self, queue_url: &str, tasks: &[Task]) -> Result<usize> {
        let encoded = tasks.iter().map(encode_task).collect::<Result<Vec<_>>>()?;

        let mut pushed = 0usize;
        for span in batch_spans(&encoded) {
            let mut entries = Vec::with_capacity(span.len());
            for (offset, task) in encoded[span.clone()].iter().enumerate() {
                entries.push(
                    SendMessageBatchRequestEntry::builder()
                        .id(format!("task-{}", span.start + offset))
                        .message_body(&task.body)
                        .message_attributes(TASK_ATTRIBUTE, task_attribute(task.payload.clone())?)
                        .build()
                        .context("Failed to build batch entry")?,
                );
            }

            let batch_len = entries.len();
            let out = self
                .client
                .send_message_batch()
                .queue_url(queue_url)
                .set_entries(Some(entries))
                .send()
                .await
                .context("Queue batch send failed")?;

            if !out.failed().is_empty() {
                bail!(
                    "Queue rejected {} of {} entries in a batch",
                    out.failed().len(),
                    batch_len
                );
            }

            pushed += batch_len;
            if pushed / PUSH_LOG_INTERVAL != (pushed - batch_len) / PUSH_LOG_INTERVAL {
                tracing::info!(pushed, total = tasks.len(), "Pushed tasks to queue");
            }
        }

        tracing::info!(pushed, "Finished pushing tasks to queue");
        Ok(pushed)
    }

    /// Pull at most one task, leaving it invisible for
    /// `visibility_timeout_secs`. Returns `None` when the queue is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the receive call fails or the message does not
    /// carry a decodable task.
    pub async fn pull_task(
        &self,
        queue_url: &str,
        visibility_timeout_secs: i32,
    ) -> Result<Option<PulledTask>> {
        let out = self
            .client
            .receive_message()
            .queue_url(queue_url)
            .max_number_of_messages(1)
            .visibility_timeout(visibility_timeout_secs)
            .message_attribute_names("All")
            .send()
            .await
            .context("Queue receive failed")?;

        let Some(message) = out.messages().first() else {
            return Ok(None);
        };

        let task = task_from_message(message)?;
        let receipt_handle = message
            .receipt_handle()
            .context("Queue message has no receipt handle")?
            .to_string();

        Ok(Some(PulledTask {
            task,
            receipt_handle,
        }))
    }

    /// Delete a processed message.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete call fails.
    pub async fn delete_message(&self, queue_url: &str, receipt_handle: &str) -> Result<()> {
        self.client
            .delete_message()
            .queue_url(queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .context("Queue message delete failed")?;
        Ok(())
    }

    /// Move messages from one queue to another (attributes preserved) until
    /// the source is empty or `limit` messages have moved. Returns the count.
    ///
    /// # Errors
    ///
    /// Returns an error if any receive, send, or delete call fails.
    pub async fn redrive(
        &self,
        source_url: &str,
        dest_url: &str,
        limit: Option<usize>,
    ) -> Result<usize> {
        let mut moved = 0usize;

        loop {
            let want = match limit {
                Some(limit) if moved >= limit => break,
                Some(limit) => (limit - moved).min(BATCH_MAX_ENTRIES),
                None => BATCH_MAX_ENTRIES,
            };

            let out = self
                .client
                .receive_message()
                .queue_url(source_url)
                .max_number_of_messages(want as i32)
                .message_attribute_names("All")
                .send()
                .await
                .context("Redrive receive failed")?;

            let messages = out.messages();
            if messages.is_empty() {
                break;
            }

            let mut sends = Vec::with_capacity(messages.len());
            let mut deletes = Vec::with_capacity(messages.len());
            for (i, message) in messages.iter().enumerate() {
                let mut entry = SendMessageBatchRequestEntry::builder()
                    .id(format!("redrive-{i}"))
                    .message_body(message.body().unwrap_or_default());
                if let Some(attrs) = message.message_attributes() {
                    for (name, value) in attrs {
                        entry = entry.message_attributes(name, value.clone());
                    }
                }
                sends.push(entry.build().context("Failed to build redrive entry")?);

                deletes.push(
                    DeleteMessageBatchRequestEntry::builder()
                        .id(format!("redrive-{i}"))
                        .receipt_handle(
                            message
                                .receipt_handle()
                                .context("Redriven message has no receipt handle")?,
                        )
                        .build()
                        .context("Failed to build redrive delete entry")?,
                );
            }

            let sent = self
                .client
                .send_message_batch()
                .queue_url(dest_url)
                .set_entries(Some(sends))
                .send()
                .await
                .context("Redrive send failed")?;
            if !sent.failed().is_empty() {
                bail!(
                    "Redrive: destination rejected {} message(s)",
                    sent.failed().len()
                );
            }

            self.client
                .delete_message_batch()
                .queue_url(source_url)
                .set_entries(Some(deletes))
                .send()
                .await
                .context("Redrive delete failed")?;

            moved += messages.len();
            tracing::info!(moved, "Redriving messages");
        }

        tracing::info!(moved, "Redrive complete");
        Ok(moved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alchemist_types::dataset::{DatasetDoc, DatasetId};
    use alchemist_types::settings::Settings;
    use serde_json::json;
    use uuid::Uuid;

    fn settings() -> Settings {
        serde_yaml::from_str(
            r#"
version: "1.0"
specification:
  product: test_product
  measurements: [red]
  transform: passthrough
output:
  location: s3://bucket/derived
"#,
        )
        .unwrap()
    }

    fn task(uris: Vec<String>) -> Task {
        Task::new(
            DatasetDoc {
                id: DatasetId::new(Uuid::nil()),
                product: "test_product".into(),
                uris,
                center_time: None,
                metadata: json!({}),
            },
            settings(),
        )
    }

    fn sized(body_len: usize, payload_len: usize) -> EncodedTask {
        EncodedTask {
            body: "b".repeat(body_len),
            payload: vec![0u8; payload_len],
        }
    }

    #[test]
    fn encode_decode_roundtrip() {
        let t = task(vec!["s3://bucket/scene".into()]);
        let encoded = encode_task(&t).unwrap();
        assert_eq!(encoded.body, "s3://bucket/scene");
        let back = decode_task(&encoded.payload).unwrap();
        assert_eq!(t, back);
    }

    #[test]
    fn encode_uses_fallback_body_without_uris() {
        let encoded = encode_task(&task(vec![])).unwrap();
        assert_eq!(encoded.body, alchemist_types::task::LOCATION_NOT_KNOWN);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode_task(b"not json").is_err());
    }

    #[test]
    fn batches_split_at_entry_cap() {
        let encoded: Vec<_> = (0..25).map(|_| sized(10, 100)).collect();
        let spans = batch_spans(&encoded);
        assert_eq!(spans, vec![0..10, 10..20, 20..25]);
    }

    #[test]
    fn batches_split_before_byte_cap() {
        // Three tasks of ~90 kB: two fit under the 180 kB flush threshold,
        // the third starts a new batch.
        let encoded: Vec<_> = (0..3).map(|_| sized(0, 89_000)).collect();
        let spans = batch_spans(&encoded);
        assert_eq!(spans, vec![0..2, 2..3]);
    }

    #[test]
    fn oversized_task_gets_own_batch() {
        let encoded = vec![sized(0, 10), sized(0, 500_000), sized(0, 10)];
        let spans = batch_spans(&encoded);
        assert_eq!(spans, vec![0..1, 1..2, 2..3]);
    }

    #[test]
    fn empty_input_yields_no_batches() {
        assert!(batch_spans(&[]).is_empty());
    }
}
