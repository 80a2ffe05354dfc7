//! Output locations and S3 staging.
//!
//! Executors always write to a local directory. For `s3://` output locations
//! that directory is a staging area, and [`Staging::upload_if_needed`] copies
//! the staged tree up after the transform finishes. Local locations upload
//! nothing.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use walkdir::WalkDir;

/// A parsed `output.location` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputLocation {
    Local(PathBuf),
    S3 { bucket: String, prefix: String },
}

impl OutputLocation {
    /// Parse `s3://bucket[/prefix]` or a local directory path.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty location or an `s3://` URL without a
    /// bucket.
    pub fn parse(location: &str) -> Result<Self> {
        let trimmed = location.trim();
        if trimmed.is_empty() {
            bail!("Output location is empty");
        }

        if let Some(rest) = trimmed.strip_prefix("s3://") {
            let (bucket, prefix) = match rest.split_once('/') {
                Some((bucket, prefix)) => (bucket, prefix.trim_end_matches('/')),
                None => (rest, ""),
            };
            if bucket.is_empty() {
                bail!("S3 location '{trimmed}' has no bucket");
            }
            return Ok(Self::S3 {
                bucket: bucket.to_string(),
                prefix: prefix.to_string(),
            });
        }

        if trimmed.contains("://") {
            bail!("Unsupported output location scheme in '{trimmed}'");
        }

        Ok(Self::Local(PathBuf::from(trimmed)))
    }

    /// `true` for `s3://` locations.
    #[must_use]
    pub fn is_s3(&self) -> bool {
        matches!(self, Self::S3 { .. })
    }

    /// Location with `subdir` appended (path join for local, key join for S3).
    #[must_use]
    fn join(&self, subdir: &str) -> Self {
        if subdir.is_empty() {
            return self.clone();
        }
        match self {
            Self::Local(path) => Self::Local(path.join(subdir)),
            Self::S3 { bucket, prefix } => Self::S3 {
                bucket: bucket.clone(),
                prefix: if prefix.is_empty() {
                    subdir.to_string()
                } else {
                    format!("{prefix}/{subdir}")
                },
            },
        }
    }
}

impl std::fmt::Display for OutputLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local(path) => write!(f, "{}", path.display()),
            Self::S3 { bucket, prefix } if prefix.is_empty() => write!(f, "s3://{bucket}"),
            Self::S3 { bucket, prefix } => write!(f, "s3://{bucket}/{prefix}"),
        }
    }
}

/// Local working directory for one output location, staged when the final
/// destination is S3.
#[derive(Debug)]
pub struct Staging {
    location: OutputLocation,
    work_root: PathBuf,
}

impl Staging {
    /// Prepare a working directory for `subdir` under the location. Local
    /// locations are used directly; S3 locations stage under `staging_root`
    /// (defaults to `$TMPDIR/alchemist-staging`) and the upload prefix gains
    /// the subdir.
    ///
    /// # Errors
    ///
    /// Returns an error if the location does not parse or the directory
    /// cannot be created.
    pub fn prepare(location: &str, subdir: &str, staging_root: Option<&Path>) -> Result<Self> {
        let location = OutputLocation::parse(location)?.join(subdir);
        let work_root = match &location {
            OutputLocation::Local(path) => path.clone(),
            OutputLocation::S3 { .. } => staging_root
                .map(Path::to_path_buf)
                .unwrap_or_else(|| std::env::temp_dir().join("alchemist-staging"))
                .join(subdir),
        };
        std::fs::create_dir_all(&work_root).with_context(|| {
            format!("Failed to create output directory '{}'", work_root.display())
        })?;
        Ok(Self {
            location,
            work_root,
        })
    }

    /// Directory the executor writes into.
    #[must_use]
    pub fn work_root(&self) -> &Path {
        &self.work_root
    }

    /// Final location this staging resolves to.
    #[must_use]
    pub fn location(&self) -> &OutputLocation {
        &self.location
    }

    /// Upload the staged tree when the destination is S3; a no-op for local
    /// locations. Returns the number of objects uploaded.
    ///
    /// # Errors
    ///
    /// Returns an error on the first failed upload.
    pub async fn upload_if_needed(
        &self,
        s3: &aws_sdk_s3::Client,
        make_public: bool,
    ) -> Result<usize> {
        let OutputLocation::S3 { bucket, prefix } = &self.location else {
            return Ok(0);
        };

        let mut uploaded = 0usize;
        for entry in WalkDir::new(&self.work_root) {
            let entry = entry.context("Failed to walk staged output tree")?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(&self.work_root)
                .context("Staged file outside the staging root")?;
            let key = object_key(prefix, relative);

            let body = ByteStream::from_path(entry.path()).await.with_context(|| {
                format!("Failed to read staged file '{}'", entry.path().display())
            })?;

            let mut request = s3
                .put_object()
                .bucket(bucket)
                .key(&key)
                .body(body);
            if let Some(content_type) = content_type_for(entry.path()) {
                request = request.content_type(content_type);
            }
            if make_public {
                request = request.acl(ObjectCannedAcl::PublicRead);
            }

            request
                .send()
                .await
                .with_context(|| format!("Failed to upload 's3://{bucket}/{key}'"))?;

            tracing::debug!(bucket, key, "Uploaded staged object");
            uploaded += 1;
        }

        tracing::info!(
            bucket,
            prefix,
            objects = uploaded,
            "Uploaded staged outputs"
        );
        Ok(uploaded)
    }
}

/// S3 object key for a staged file relative to the upload prefix.
fn object_key(prefix: &str, relative: &Path) -> String {
    let rel = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    if prefix.is_empty() {
        rel
    } else {
        format!("{prefix}/{rel}")
    }
}

fn content_type_for(path: &Path) -> Option<&'static str> {
    match path.extension()?.to_str()? {
        "json" => Some("application/json"),
        "yaml" | "yml" => Some("text/yaml"),
        "tif" | "tiff" => Some("image/tiff"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_s3_locations() {
        assert_eq!(
            OutputLocation::parse("s3://dea-public-data/derived/ga_ls8").unwrap(),
            OutputLocation::S3 {
                bucket: "dea-public-data".into(),
                prefix: "derived/ga_ls8".into(),
            }
        );
        assert_eq!(
            OutputLocation::parse("s3://bucket").unwrap(),
            OutputLocation::S3 {
                bucket: "bucket".into(),
                prefix: String::new(),
            }
        );
    }

    #[test]
    fn trailing_slash_stripped_from_prefix() {
        assert_eq!(
            OutputLocation::parse("s3://bucket/derived/").unwrap(),
            OutputLocation::S3 {
                bucket: "bucket".into(),
                prefix: "derived".into(),
            }
        );
    }

    #[test]
    fn parses_local_paths() {
        let loc = OutputLocation::parse("/data/out").unwrap();
        assert_eq!(loc, OutputLocation::Local(PathBuf::from("/data/out")));
        assert!(!loc.is_s3());
    }

    #[test]
    fn rejects_empty_and_unknown_schemes() {
        assert!(OutputLocation::parse("  ").is_err());
        assert!(OutputLocation::parse("s3://").is_err());
        assert!(OutputLocation::parse("gs://bucket/x").is_err());
    }

    #[test]
    fn local_staging_uses_location_directly() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("results");
        let staging = Staging::prepare(out.to_str().unwrap(), "", None).unwrap();
        assert_eq!(staging.work_root(), out.as_path());
        assert!(out.is_dir());
        assert!(!staging.location().is_s3());
    }

    #[test]
    fn local_staging_appends_subdir() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("results");
        let staging =
            Staging::prepare(out.to_str().unwrap(), "ls8/abc123", None).unwrap();
        assert_eq!(staging.work_root(), out.join("ls8/abc123").as_path());
        assert!(out.join("ls8/abc123").is_dir());
    }

    #[test]
    fn s3_staging_uses_staging_root_and_extends_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let staging =
            Staging::prepare("s3://bucket/derived", "ls8/abc123", Some(dir.path())).unwrap();
        assert_eq!(staging.work_root(), dir.path().join("ls8/abc123").as_path());
        assert_eq!(
            staging.location(),
            &OutputLocation::S3 {
                bucket: "bucket".into(),
                prefix: "derived/ls8/abc123".into(),
            }
        );
        assert_eq!(staging.location().to_string(), "s3://bucket/derived/ls8/abc123");
    }

    #[test]
    fn object_keys_join_with_prefix() {
        assert_eq!(
            object_key("derived/v1", Path::new("scene/red.tif")),
            "derived/v1/scene/red.tif"
        );
        assert_eq!(object_key("", Path::new("metadata.json")), "metadata.json");
    }

    #[test]
    fn content_types_for_known_extensions() {
        assert_eq!(
            content_type_for(Path::new("a/metadata.json")),
            Some("application/json")
        );
        assert_eq!(content_type_for(Path::new("b.tif")), Some("image/tiff"));
        assert_eq!(content_type_for(Path::new("c.dat")), None);
        assert_eq!(content_type_for(Path::new("noext")), None);
    }
}
