//! Semantic validation for parsed job settings.

use anyhow::{bail, Result};

use alchemist_types::settings::Settings;

/// Validate parsed job settings.
/// Returns `Ok(())` if valid, Err listing all problems found if not.
///
/// Transform names are resolved at execution time, not here; the `check`
/// command probes the registry separately.
///
/// # Errors
///
/// Returns an error listing every validation failure.
pub fn validate_settings(settings: &Settings) -> Result<()> {
    let mut errors = Vec::new();

    if settings.version != "1.0" {
        errors.push(format!(
            "Unsupported settings version '{}', expected '1.0'",
            settings.version
        ));
    }

    let spec = &settings.specification;
    if spec.product.trim().is_empty() {
        errors.push("specification.product must not be empty".to_string());
    }
    if spec.measurements.is_empty() {
        errors.push("specification.measurements must list at least one band".to_string());
    }
    for (i, m) in spec.measurements.iter().enumerate() {
        if m.trim().is_empty() {
            errors.push(format!("specification.measurements[{i}] is empty"));
        }
    }
    if spec.transform.trim().is_empty() {
        errors.push("specification.transform must not be empty".to_string());
    }

    if settings.output.location.trim().is_empty() {
        errors.push("output.location must not be empty".to_string());
    }

    if settings.queue.visibility_timeout_secs <= 0 {
        errors.push("queue.visibility_timeout_secs must be > 0".to_string());
    }

    if let Some(limit) = settings.processing.task_limit {
        if limit == 0 {
            errors.push("processing.task_limit must be at least 1 when set".to_string());
        }
    }

    if let Some(arn) = &settings.notification.topic_arn {
        if !arn.starts_with("arn:") {
            errors.push(format!(
                "notification.topic_arn '{arn}' does not look like an ARN"
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        bail!("Settings validation failed:\n  - {}", errors.join("\n  - "));
    }
}
