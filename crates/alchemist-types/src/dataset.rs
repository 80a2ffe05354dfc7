//! Indexed dataset records as returned by the datacube catalog.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Opaque dataset identifier (catalog UUID).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetId(Uuid);

impl DatasetId {
    /// Wrap an existing catalog UUID.
    #[must_use]
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    /// Borrow the inner UUID.
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl std::fmt::Display for DatasetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for DatasetId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl From<Uuid> for DatasetId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

// ---------------------------------------------------------------------------
// Dataset document
// ---------------------------------------------------------------------------

/// One indexed dataset: identity, product, known storage locations, and the
/// raw metadata document from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetDoc {
    pub id: DatasetId,
    /// Product (dataset type) name, e.g. `"ls8_level1_scene"`.
    pub product: String,
    /// Storage URIs in catalog order. May be empty for metadata-only records.
    #[serde(default)]
    pub uris: Vec<String>,
    /// Acquisition center time, when the catalog records one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub center_time: Option<DateTime<Utc>>,
    /// Full metadata document as stored in the catalog.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl DatasetDoc {
    /// Primary storage URI, if the catalog knows one.
    #[must_use]
    pub fn primary_uri(&self) -> Option<&str> {
        self.uris.first().map(String::as_str)
    }

    /// Look up a dotted path (e.g. `"properties.platform"`) in the metadata
    /// document, returning the value rendered as a string.
    #[must_use]
    pub fn metadata_field(&self, path: &str) -> Option<String> {
        let mut node = &self.metadata;
        for part in path.split('.') {
            node = node.get(part)?;
        }
        match node {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> DatasetDoc {
        DatasetDoc {
            id: DatasetId::new(Uuid::nil()),
            product: "ls8_level1_scene".into(),
            uris: vec![
                "s3://bucket/scene/one".into(),
                "file:///archive/scene/one".into(),
            ],
            center_time: None,
            metadata: json!({
                "properties": {"platform": "landsat-8", "cloud_cover": 12.5}
            }),
        }
    }

    #[test]
    fn dataset_id_parse_and_display() {
        let id: DatasetId = "9f3ab2c1-7c2f-4a1e-8d61-0a8a2a9f8d11".parse().unwrap();
        assert_eq!(id.to_string(), "9f3ab2c1-7c2f-4a1e-8d61-0a8a2a9f8d11");
    }

    #[test]
    fn dataset_id_rejects_garbage() {
        assert!("not-a-uuid".parse::<DatasetId>().is_err());
    }

    #[test]
    fn primary_uri_is_first() {
        assert_eq!(doc().primary_uri(), Some("s3://bucket/scene/one"));

        let mut empty = doc();
        empty.uris.clear();
        assert!(empty.primary_uri().is_none());
    }

    #[test]
    fn metadata_field_walks_dotted_paths() {
        let d = doc();
        assert_eq!(
            d.metadata_field("properties.platform"),
            Some("landsat-8".to_string())
        );
        assert_eq!(
            d.metadata_field("properties.cloud_cover"),
            Some("12.5".to_string())
        );
        assert!(d.metadata_field("properties.missing").is_none());
    }

    #[test]
    fn serde_roundtrip_preserves_metadata() {
        let d = doc();
        let json = serde_json::to_string(&d).unwrap();
        let back: DatasetDoc = serde_json::from_str(&json).unwrap();
        assert_eq!(d, back);
    }
}
