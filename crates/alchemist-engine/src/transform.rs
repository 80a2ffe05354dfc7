//! Transform resolution.
//!
//! The pixel engines themselves are external collaborators; this module owns
//! the seam: the [`Transform`] trait, the name registry, and two reference
//! implementations used for wiring checks and tests.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use alchemist_types::dataset::DatasetDoc;

/// Everything a transform gets to see for one task.
pub struct TransformInput<'a> {
    pub dataset: &'a DatasetDoc,
    /// Measurement (band) names from the job specification.
    pub measurements: &'a [String],
    /// Free-form `transform_args` from the job specification.
    pub args: &'a serde_json::Value,
    /// Directory the transform writes into (already created, possibly a
    /// staging directory for an S3 output location).
    pub output_dir: &'a Path,
}

/// What a transform produced.
#[derive(Debug, Default)]
pub struct TransformOutput {
    /// Files written, relative to the output directory.
    pub written: Vec<PathBuf>,
    /// Extra properties merged into the output metadata document.
    pub properties: serde_json::Value,
}

/// A named dataset transform.
pub trait Transform: Send + Sync {
    /// Registry name used in `specification.transform`.
    fn id(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Apply the transform to one dataset.
    ///
    /// # Errors
    ///
    /// Returns an error if the arguments are invalid or the dataset cannot
    /// be processed.
    fn apply(&self, input: &TransformInput<'_>) -> Result<TransformOutput>;
}

static REGISTRY: &[&dyn Transform] = &[&Passthrough, &Rescale];

/// All registered transforms.
#[must_use]
pub fn registered() -> &'static [&'static dyn Transform] {
    REGISTRY
}

/// Resolve a transform by registry name.
///
/// # Errors
///
/// Unknown names fail with the list of known transforms.
pub fn resolve(name: &str) -> Result<&'static dyn Transform> {
    REGISTRY.iter().copied().find(|t| t.id() == name).ok_or_else(|| {
        let known: Vec<&str> = REGISTRY.iter().map(|t| t.id()).collect();
        anyhow::anyhow!(
            "Unknown transform '{}'; known transforms: {}",
            name,
            known.join(", ")
        )
    })
}

/// Local filesystem path for a dataset URI, when it has one.
fn local_path(uri: &str) -> Option<PathBuf> {
    uri.strip_prefix("file://").map(PathBuf::from)
}

// ---------------------------------------------------------------------------
// Reference transforms
// ---------------------------------------------------------------------------

/// Copies the named measurement files from the dataset location unchanged.
struct Passthrough;

impl Transform for Passthrough {
    fn id(&self) -> &'static str {
        "passthrough"
    }

    fn description(&self) -> &'static str {
        "Copy the selected measurement files to the output location unchanged"
    }

    fn apply(&self, input: &TransformInput<'_>) -> Result<TransformOutput> {
        let uri = input
            .dataset
            .primary_uri()
            .context("Dataset has no recorded location")?;
        let path = local_path(uri)
            .with_context(|| format!("Dataset location '{uri}' is not a local file URI"))?;
        let dataset_dir = if path.is_dir() {
            path
        } else {
            path.parent()
                .context("Dataset file has no parent directory")?
                .to_path_buf()
        };

        let mut written = Vec::new();
        for measurement in input.measurements {
            let source = find_measurement_file(&dataset_dir, measurement)?;
            let file_name = source
                .file_name()
                .context("Measurement file has no name")?
                .to_owned();
            let dest = input.output_dir.join(&file_name);
            std::fs::copy(&source, &dest).with_context(|| {
                format!("Failed to copy '{}' to '{}'", source.display(), dest.display())
            })?;
            written.push(PathBuf::from(file_name));
        }

        Ok(TransformOutput {
            written,
            properties: serde_json::Value::Null,
        })
    }
}

/// The file under `dir` whose stem is exactly the measurement name.
fn find_measurement_file(dir: &Path, measurement: &str) -> Result<PathBuf> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read dataset directory '{}'", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if path.is_file()
            && path
                .file_stem()
                .is_some_and(|stem| stem.to_string_lossy() == measurement)
        {
            return Ok(path);
        }
    }
    bail!(
        "Measurement '{}' not found under '{}'",
        measurement,
        dir.display()
    )
}

/// Validates linear scaling arguments and records them for the downstream
/// pixel engine; writes no rasters itself.
struct Rescale;

impl Transform for Rescale {
    fn id(&self) -> &'static str {
        "rescale"
    }

    fn description(&self) -> &'static str {
        "Record linear scale/offset parameters for the selected measurements"
    }

    fn apply(&self, input: &TransformInput<'_>) -> Result<TransformOutput> {
        let scale = input
            .args
            .get("scale")
            .and_then(serde_json::Value::as_f64)
            .context("rescale requires a numeric 'scale' argument")?;
        let offset = input
            .args
            .get("offset")
            .map(|v| {
                v.as_f64()
                    .context("rescale 'offset' argument must be numeric")
            })
            .transpose()?
            .unwrap_or(0.0);

        if scale == 0.0 {
            bail!("rescale 'scale' argument must be non-zero");
        }

        Ok(TransformOutput {
            written: Vec::new(),
            properties: serde_json::json!({
                "alchemist:scale": scale,
                "alchemist:offset": offset,
                "alchemist:measurements": input.measurements,
            }),
        })
    }
}
