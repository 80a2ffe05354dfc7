use std::path::Path;

use anyhow::{Context, Result};

use alchemist_engine::config;
use alchemist_engine::generate;
use alchemist_engine::index::PgIndex;
use alchemist_types::expression::parse_expressions;

/// Execute the `run-many` command: generate tasks from the index and run
/// them sequentially.
pub async fn execute(
    config_file: &Path,
    expressions: &[String],
    environment: Option<&str>,
    limit: Option<usize>,
) -> Result<()> {
    let settings = config::load_settings(config_file)
        .with_context(|| format!("Failed to load settings: {}", config_file.display()))?;
    config::validate_settings(&settings)?;

    let expressions = parse_expressions(expressions)?;

    let index = PgIndex::connect(environment).await?;
    let tasks = generate::generate_tasks(&index, &settings, &expressions, limit).await?;

    if tasks.is_empty() {
        println!("No datasets matched the search expressions; nothing to do.");
        return Ok(());
    }

    let executor = super::build_executor(&settings, false).await;
    let summary = executor.execute_all(&tasks).await;

    super::print_summary(&summary);

    if summary.all_succeeded() {
        Ok(())
    } else {
        anyhow::bail!("{} of {} tasks failed", summary.failed, summary.generated)
    }
}
