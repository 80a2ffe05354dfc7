//! Task generation: dataset discovery wrapped into executable tasks.

use anyhow::{bail, Context, Result};

use alchemist_types::dataset::DatasetId;
use alchemist_types::expression::{SearchExpression, SearchValue};
use alchemist_types::settings::Settings;
use alchemist_types::task::Task;

use crate::index::DatasetIndex;

/// Generate tasks for every dataset matching the search expressions.
///
/// The job's `specification.product` is applied unless the expressions
/// already constrain `product`; an explicit `--limit` wins over
/// `processing.task_limit`.
///
/// # Errors
///
/// Returns an error if the index query fails.
pub async fn generate_tasks(
    index: &dyn DatasetIndex,
    settings: &Settings,
    expressions: &[SearchExpression],
    limit: Option<usize>,
) -> Result<Vec<Task>> {
    let expressions = with_product_expression(settings, expressions);
    let limit = limit.or(settings.processing.task_limit);

    let datasets = index
        .search(&expressions, limit)
        .await
        .context("Dataset search failed")?;

    tracing::info!(
        product = settings.specification.product,
        datasets = datasets.len(),
        "Generated tasks from index search"
    );

    Ok(datasets
        .into_iter()
        .map(|ds| Task::new(ds, settings.clone()))
        .collect())
}

/// Generate a single task from a dataset id or storage location.
///
/// Inputs containing `://` are treated as URIs; anything else is a local
/// path, made absolute and given a `file://` scheme. When a location maps to
/// several datasets the first match is taken with a warning.
///
/// # Errors
///
/// Returns an error if nothing in the index matches the input.
pub async fn generate_task(
    index: &dyn DatasetIndex,
    settings: &Settings,
    input: &str,
) -> Result<Task> {
    if let Ok(id) = input.parse::<DatasetId>() {
        let dataset = index
            .get(id)
            .await
            .context("Dataset lookup failed")?
            .with_context(|| format!("No dataset with id {id} in the index"))?;
        return Ok(Task::new(dataset, settings.clone()));
    }

    let uri = if input.contains("://") {
        input.to_string()
    } else {
        let absolute = std::path::absolute(input)
            .with_context(|| format!("Cannot resolve local path '{input}'"))?;
        format!("file://{}", absolute.display())
    };

    let mut datasets = index
        .datasets_for_location(&uri)
        .await
        .context("Dataset location lookup failed")?;

    if datasets.is_empty() {
        bail!("No dataset indexed at location '{uri}'");
    }
    if datasets.len() > 1 {
        tracing::warn!(
            location = uri,
            matches = datasets.len(),
            "Location maps to multiple datasets; taking the first"
        );
    }

    Ok(Task::new(datasets.remove(0), settings.clone()))
}

/// Prepend the job's product constraint unless the caller already gave one.
fn with_product_expression(
    settings: &Settings,
    expressions: &[SearchExpression],
) -> Vec<SearchExpression> {
    let mut merged = Vec::with_capacity(expressions.len() + 1);
    if !expressions.iter().any(|e| e.field() == "product") {
        merged.push(SearchExpression::Equals {
            field: "product".to_string(),
            value: SearchValue::Text(settings.specification.product.clone()),
        });
    }
    merged.extend_from_slice(expressions);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use alchemist_types::expression::parse_expression;

    fn settings() -> Settings {
        serde_yaml::from_str(
            r#"
version: "1.0"
specification:
  product: ls8_level1_scene
  measurements: [red]
  transform: passthrough
output:
  location: /tmp/out
"#,
        )
        .unwrap()
    }

    #[test]
    fn product_expression_added_when_absent() {
        let exprs = vec![parse_expression("time=2020").unwrap()];
        let merged = with_product_expression(&settings(), &exprs);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].field(), "product");
    }

    #[test]
    fn explicit_product_expression_wins() {
        let exprs = vec![parse_expression("product=s2a_ard_granule").unwrap()];
        let merged = with_product_expression(&settings(), &exprs);
        assert_eq!(merged.len(), 1);
        match &merged[0] {
            SearchExpression::Equals { value, .. } => {
                assert_eq!(value.to_string(), "s2a_ard_granule");
            }
            other => panic!("expected equals, got {other:?}"),
        }
    }
}
