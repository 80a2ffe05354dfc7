use std::path::Path;

use anyhow::{Context, Result};

use alchemist_engine::config;
use alchemist_engine::generate;
use alchemist_engine::index::PgIndex;

/// Execute the `run-one` command: build and run a single task from a dataset
/// id or location.
pub async fn execute(
    config_file: &Path,
    input_dataset: &str,
    environment: Option<&str>,
) -> Result<()> {
    let settings = config::load_settings(config_file)
        .with_context(|| format!("Failed to load settings: {}", config_file.display()))?;
    config::validate_settings(&settings)?;

    let index = PgIndex::connect(environment).await?;
    let task = generate::generate_task(&index, &settings, input_dataset).await?;

    super::execute_single(&task, false).await
}
