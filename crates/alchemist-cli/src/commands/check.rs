use std::path::Path;

use anyhow::Result;
use aws_config::BehaviorVersion;

use alchemist_engine::config;
use alchemist_engine::index::{DatasetIndex, PgIndex};
use alchemist_engine::queue::QueueBridge;
use alchemist_engine::transform;
use alchemist_engine::CheckReport;
use alchemist_types::error::ValidationResult;
use alchemist_types::settings::Settings;

/// Execute the `check` command: validate settings and probe the index, the
/// transform registry, and the queue.
pub async fn execute(config_file: &Path, environment: Option<&str>) -> Result<()> {
    let settings = match load_and_validate(config_file) {
        Ok(settings) => settings,
        Err(e) => {
            let report = CheckReport {
                settings: ValidationResult::failed(format!("{e:#}")),
                index: ValidationResult::skipped("settings not loaded"),
                transform: ValidationResult::skipped("settings not loaded"),
                queue: ValidationResult::skipped("settings not loaded"),
            };
            print_report(&report);
            anyhow::bail!("One or more checks failed")
        }
    };

    let index = match PgIndex::connect(environment).await {
        Ok(index) => match index.ping().await {
            Ok(()) => ValidationResult::success("connected"),
            Err(e) => ValidationResult::failed(format!("{e:#}")),
        },
        Err(e) => ValidationResult::failed(format!("{e:#}")),
    };

    let transform = match transform::resolve(&settings.specification.transform) {
        Ok(t) => ValidationResult::success(t.description()),
        Err(e) => ValidationResult::failed(format!("{e:#}")),
    };

    let queue = check_queue(&settings).await;

    let report = CheckReport {
        settings: ValidationResult::success("parsed and validated"),
        index,
        transform,
        queue,
    };
    print_report(&report);

    if report.all_ok() {
        println!("\nAll checks passed.");
        Ok(())
    } else {
        anyhow::bail!("One or more checks failed")
    }
}

fn load_and_validate(config_file: &Path) -> Result<Settings> {
    let settings = config::load_settings(config_file)?;
    config::validate_settings(&settings)?;
    Ok(settings)
}

async fn check_queue(settings: &Settings) -> ValidationResult {
    let Some(name) = settings.queue.name.as_deref() else {
        return ValidationResult::skipped("no queue configured");
    };

    let aws = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let bridge = QueueBridge::new(aws_sdk_sqs::Client::new(&aws));
    match bridge.queue_url(name).await {
        Ok(url) => ValidationResult::success(url),
        Err(e) => ValidationResult::failed(format!("{e:#}")),
    }
}

fn print_report(report: &CheckReport) {
    print_validation("Settings", &report.settings);
    print_validation("Index", &report.index);
    print_validation("Transform", &report.transform);
    print_validation("Queue", &report.queue);
}

fn print_validation(label: &str, result: &ValidationResult) {
    let status = match result.status {
        alchemist_types::error::ValidationStatus::Success => "OK",
        alchemist_types::error::ValidationStatus::Failed => "FAILED",
        alchemist_types::error::ValidationStatus::Skipped => "SKIPPED",
    };
    println!("{:12} {}", format!("{}:", label), status);
    if !result.message.is_empty() {
        println!("  {}", result.message);
    }
}
