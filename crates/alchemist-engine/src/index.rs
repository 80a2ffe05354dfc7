//! Dataset index access.
//!
//! The index is an external Open Data Cube Postgres catalog. [`DatasetIndex`]
//! is the seam the generator and CLI work against; [`PgIndex`] is the real
//! implementation. Product and time predicates are pushed into SQL; every
//! predicate is also applied client-side via [`matches_expressions`] so all
//! implementations filter identically.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls, Row};

use alchemist_types::dataset::{DatasetDoc, DatasetId};
use alchemist_types::expression::{SearchExpression, SearchValue};

/// Environment variable holding the default catalog connection URL.
pub const DEFAULT_DB_URL_VAR: &str = "DATACUBE_DB_URL";

/// Read-only view of the dataset catalog.
#[async_trait]
pub trait DatasetIndex: Send + Sync {
    /// Datasets matching every expression, newest first, up to `limit`.
    async fn search(
        &self,
        expressions: &[SearchExpression],
        limit: Option<usize>,
    ) -> Result<Vec<DatasetDoc>>;

    /// Single dataset by catalog id.
    async fn get(&self, id: DatasetId) -> Result<Option<DatasetDoc>>;

    /// Datasets indexed at the given storage URI.
    async fn datasets_for_location(&self, uri: &str) -> Result<Vec<DatasetDoc>>;

    /// Connectivity probe for the check command.
    async fn ping(&self) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Client-side predicate matching
// ---------------------------------------------------------------------------

/// Apply every expression to a dataset document.
///
/// `product` matches the dataset's product name; `time` ranges match the
/// acquisition center time; all other fields are dotted paths into the
/// metadata document.
#[must_use]
pub fn matches_expressions(doc: &DatasetDoc, expressions: &[SearchExpression]) -> bool {
    expressions.iter().all(|expr| match expr {
        SearchExpression::Equals { field, value } => {
            let actual = if field == "product" {
                Some(doc.product.clone())
            } else {
                doc.metadata_field(field)
            };
            match (actual, value) {
                (Some(a), SearchValue::Text(want)) => a == *want,
                (Some(a), SearchValue::Number(want)) => {
                    a.parse::<f64>().is_ok_and(|n| (n - want).abs() < f64::EPSILON)
                }
                (None, _) => false,
            }
        }
        SearchExpression::NumberRange { field, low, high } => doc
            .metadata_field(field)
            .and_then(|v| v.parse::<f64>().ok())
            .is_some_and(|n| n >= *low && n <= *high),
        SearchExpression::TimeRange { start, end } => doc
            .center_time
            .is_some_and(|t| t >= *start && t <= *end),
    })
}

/// Acquisition center time recorded in a catalog metadata document, checking
/// the eo3 (`properties.datetime`) and legacy (`extent.center_dt`) homes.
#[must_use]
pub fn center_time_of(metadata: &serde_json::Value) -> Option<DateTime<Utc>> {
    let raw = metadata
        .pointer("/properties/datetime")
        .or_else(|| metadata.pointer("/extent/center_dt"))?
        .as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .ok()
}

// ---------------------------------------------------------------------------
// Postgres catalog implementation
// ---------------------------------------------------------------------------

const DATASET_SELECT: &str = "\
SELECT d.id, t.name AS product, d.metadata, \
COALESCE(array_agg(l.uri_scheme || ':' || l.uri_body ORDER BY l.added) \
  FILTER (WHERE l.uri_body IS NOT NULL), '{}'::text[]) AS uris \
FROM agdc.dataset d \
JOIN agdc.dataset_type t ON t.id = d.dataset_type_ref \
LEFT JOIN agdc.dataset_location l ON l.dataset_ref = d.id AND l.archived IS NULL \
WHERE d.archived IS NULL";

const DATASET_GROUP: &str = " GROUP BY d.id, t.name, d.metadata, d.added";

/// Dataset index backed by the ODC Postgres catalog.
pub struct PgIndex {
    client: Client,
}

impl PgIndex {
    /// Connect using the environment's catalog URL: `ODC_<ENV>_DB_URL` when
    /// an environment name is given, `DATACUBE_DB_URL` otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the variable is unset or the connection fails.
    pub async fn connect(environment: Option<&str>) -> Result<Self> {
        let var = match environment {
            Some(env) => format!("ODC_{}_DB_URL", env.to_uppercase()),
            None => DEFAULT_DB_URL_VAR.to_string(),
        };
        let connstr = std::env::var(&var)
            .with_context(|| format!("Datacube connection URL not set ({var})"))?;
        Self::connect_str(&connstr).await
    }

    /// Connect with an explicit `tokio-postgres` connection string or URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub async fn connect_str(connstr: &str) -> Result<Self> {
        let (client, connection) = tokio_postgres::connect(connstr, NoTls)
            .await
            .context("Failed to connect to the datacube index")?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(error = %e, "Datacube index connection error");
            }
        });

        Ok(Self { client })
    }

    fn row_to_doc(row: &Row) -> DatasetDoc {
        let metadata: serde_json::Value = row.get("metadata");
        DatasetDoc {
            id: DatasetId::new(row.get("id")),
            product: row.get("product"),
            uris: row.get("uris"),
            center_time: center_time_of(&metadata),
            metadata,
        }
    }
}

#[async_trait]
impl DatasetIndex for PgIndex {
    async fn search(
        &self,
        expressions: &[SearchExpression],
        limit: Option<usize>,
    ) -> Result<Vec<DatasetDoc>> {
        let mut sql = DATASET_SELECT.to_string();
        let mut params: Vec<Box<dyn ToSql + Sync + Send>> = Vec::new();

        for expr in expressions {
            match expr {
                SearchExpression::Equals {
                    field,
                    value: SearchValue::Text(product),
                } if field == "product" => {
                    params.push(Box::new(product.clone()));
                    sql.push_str(&format!(" AND t.name = ${}", params.len()));
                }
                SearchExpression::TimeRange { start, end } => {
                    params.push(Box::new(*start));
                    params.push(Box::new(*end));
                    sql.push_str(&format!(
                        " AND COALESCE(d.metadata #>> '{{properties,datetime}}', \
                         d.metadata #>> '{{extent,center_dt}}')::timestamptz \
                         BETWEEN ${} AND ${}",
                        params.len() - 1,
                        params.len()
                    ));
                }
                // Everything else is matched client-side below.
                _ => {}
            }
        }

        sql.push_str(DATASET_GROUP);
        sql.push_str(" ORDER BY d.added DESC");
        if let Some(limit) = limit {
            params.push(Box::new(limit as i64));
            sql.push_str(&format!(" LIMIT ${}", params.len()));
        }

        let param_refs: Vec<&(dyn ToSql + Sync)> = params
            .iter()
            .map(|p| p.as_ref() as &(dyn ToSql + Sync))
            .collect();
        let rows = self
            .client
            .query(sql.as_str(), &param_refs)
            .await
            .context("Dataset search query failed")?;

        Ok(rows
            .iter()
            .map(Self::row_to_doc)
            .filter(|doc| matches_expressions(doc, expressions))
            .collect())
    }

    async fn get(&self, id: DatasetId) -> Result<Option<DatasetDoc>> {
        let sql = format!("{DATASET_SELECT} AND d.id = $1{DATASET_GROUP}");
        let rows = self
            .client
            .query(sql.as_str(), &[id.as_uuid()])
            .await
            .context("Dataset lookup query failed")?;
        Ok(rows.first().map(Self::row_to_doc))
    }

    async fn datasets_for_location(&self, uri: &str) -> Result<Vec<DatasetDoc>> {
        let sql = format!(
            "{DATASET_SELECT} AND d.id IN (\
             SELECT dataset_ref FROM agdc.dataset_location \
             WHERE uri_scheme || ':' || uri_body = $1 AND archived IS NULL)\
             {DATASET_GROUP}"
        );
        let rows = self
            .client
            .query(sql.as_str(), &[&uri])
            .await
            .context("Dataset location query failed")?;
        Ok(rows.iter().map(Self::row_to_doc).collect())
    }

    async fn ping(&self) -> Result<()> {
        self.client
            .query_one("SELECT 1::int4", &[])
            .await
            .context("Datacube index ping failed")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alchemist_types::expression::parse_expression;
    use serde_json::json;
    use uuid::Uuid;

    fn doc(product: &str, metadata: serde_json::Value) -> DatasetDoc {
        DatasetDoc {
            id: DatasetId::new(Uuid::nil()),
            product: product.into(),
            uris: vec![],
            center_time: center_time_of(&metadata),
            metadata,
        }
    }

    #[test]
    fn center_time_prefers_eo3_datetime() {
        let md = json!({
            "properties": {"datetime": "2020-05-01T06:30:00Z"},
            "extent": {"center_dt": "1999-01-01T00:00:00Z"},
        });
        assert_eq!(
            center_time_of(&md).unwrap().to_rfc3339(),
            "2020-05-01T06:30:00+00:00"
        );
    }

    #[test]
    fn center_time_falls_back_to_legacy_extent() {
        let md = json!({"extent": {"center_dt": "2018-11-20T23:59:00Z"}});
        assert!(center_time_of(&md).is_some());
        assert!(center_time_of(&json!({})).is_none());
    }

    #[test]
    fn product_equality_matches() {
        let d = doc("ls8_level1_scene", json!({}));
        let exprs = vec![parse_expression("product=ls8_level1_scene").unwrap()];
        assert!(matches_expressions(&d, &exprs));

        let exprs = vec![parse_expression("product=s2a_ard_granule").unwrap()];
        assert!(!matches_expressions(&d, &exprs));
    }

    #[test]
    fn metadata_path_equality_matches() {
        let d = doc("p", json!({"properties": {"platform": "landsat-8"}}));
        let exprs = vec![parse_expression("properties.platform=landsat-8").unwrap()];
        assert!(matches_expressions(&d, &exprs));
    }

    #[test]
    fn number_range_matches_inclusive() {
        let d = doc("p", json!({"properties": {"cloud_cover": 25.0}}));
        let inside = vec![parse_expression("properties.cloud_cover in [0, 25]").unwrap()];
        assert!(matches_expressions(&d, &inside));

        let outside = vec![parse_expression("properties.cloud_cover in [0, 10]").unwrap()];
        assert!(!matches_expressions(&d, &outside));
    }

    #[test]
    fn time_range_uses_center_time() {
        let d = doc("p", json!({"properties": {"datetime": "2020-05-15T01:00:00Z"}}));
        let inside = vec![parse_expression("time in [2020-05, 2020-05]").unwrap()];
        assert!(matches_expressions(&d, &inside));

        let outside = vec![parse_expression("time in [2020-06, 2020-07]").unwrap()];
        assert!(!matches_expressions(&d, &outside));
    }

    #[test]
    fn missing_fields_never_match() {
        let d = doc("p", json!({}));
        let exprs = vec![parse_expression("properties.cloud_cover in [0, 100]").unwrap()];
        assert!(!matches_expressions(&d, &exprs));

        // No center time recorded: time predicates cannot match.
        let exprs = vec![parse_expression("time in [2000, 2030]").unwrap()];
        assert!(!matches_expressions(&d, &exprs));
    }

    #[test]
    fn all_expressions_must_hold() {
        let d = doc(
            "ls8_level1_scene",
            json!({"properties": {"datetime": "2020-05-15T01:00:00Z", "cloud_cover": 5.0}}),
        );
        let exprs = vec![
            parse_expression("product=ls8_level1_scene").unwrap(),
            parse_expression("properties.cloud_cover in [0, 10]").unwrap(),
            parse_expression("time in [2020, 2020]").unwrap(),
        ];
        assert!(matches_expressions(&d, &exprs));

        let mut stricter = exprs.clone();
        stricter.push(parse_expression("properties.cloud_cover in [0, 1]").unwrap());
        assert!(!matches_expressions(&d, &stricter));
    }
}
