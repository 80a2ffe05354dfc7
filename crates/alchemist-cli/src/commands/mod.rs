pub mod add_to_queue;
pub mod check;
pub mod pull_from_queue;
pub mod redrive;
pub mod run_many;
pub mod run_one;
pub mod transforms;

use anyhow::Result;
use aws_config::BehaviorVersion;

use alchemist_engine::{Executor, RunSummary};
use alchemist_types::settings::Settings;
use alchemist_types::task::Task;

/// Build an executor with exactly the cloud clients this run needs: S3 for
/// `s3://` output locations, SNS when a notification topic is configured.
pub(crate) async fn build_executor(settings: &Settings, make_public: bool) -> Executor {
    let needs_s3 = settings.output.location.trim().starts_with("s3://");
    let needs_sns = settings.notification.topic_arn.is_some();

    let mut executor = Executor::new().with_make_public(make_public);
    if needs_s3 || needs_sns {
        let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        if needs_s3 {
            executor = executor.with_s3(aws_sdk_s3::Client::new(&config));
        }
        if needs_sns {
            executor = executor.with_sns(aws_sdk_sns::Client::new(&config));
        }
    }
    executor
}

/// Queue name from the CLI override or the settings file.
pub(crate) fn resolve_queue_name<'a>(
    override_name: Option<&'a str>,
    settings: &'a Settings,
) -> Result<&'a str> {
    override_name
        .or(settings.queue.name.as_deref())
        .ok_or_else(|| {
            anyhow::anyhow!("No queue given: pass --message-queue or set queue.name in settings")
        })
}

/// Run one task via the executor built from its own embedded settings.
pub(crate) async fn execute_single(task: &Task, make_public: bool) -> Result<()> {
    let executor = build_executor(&task.settings, make_public).await;
    let report = executor
        .execute(task)
        .await
        .map_err(anyhow::Error::new)?;

    println!("Task complete.");
    println!("  Dataset:   {}", report.dataset_id);
    println!("  Product:   {}", report.product);
    println!("  Transform: {}", report.transform);
    println!("  Output:    {}", report.output_location);
    println!("  Files:     {}", report.written.join(", "));
    Ok(())
}

pub(crate) fn print_summary(summary: &RunSummary) {
    println!("Run complete.");
    println!("  Tasks:     {}", summary.generated);
    println!("  Succeeded: {}", summary.succeeded);
    println!("  Failed:    {}", summary.failed);
    println!("  Duration:  {:.2}s", summary.duration_secs);
    for failure in &summary.failures {
        match failure.dataset_id {
            Some(id) => println!("  FAILED [{}] {}: {}", failure.stage, id, failure.message),
            None => println!("  FAILED [{}]: {}", failure.stage, failure.message),
        }
    }
}
