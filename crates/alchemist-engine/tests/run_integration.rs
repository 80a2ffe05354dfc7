//! End-to-end run over a local output location: settings file to finished
//! task outputs, using an in-memory dataset index in place of the Postgres
//! catalog.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use alchemist_engine::config;
use alchemist_engine::executor::{Executor, METADATA_FILE};
use alchemist_engine::generate;
use alchemist_engine::index::{matches_expressions, DatasetIndex};
use alchemist_types::dataset::{DatasetDoc, DatasetId};
use alchemist_types::expression::{parse_expressions, SearchExpression};

/// In-memory stand-in for the Postgres catalog, filtering with the same
/// predicate matcher the real index applies client-side.
struct MemoryIndex {
    datasets: Vec<DatasetDoc>,
}

#[async_trait]
impl DatasetIndex for MemoryIndex {
    async fn search(
        &self,
        expressions: &[SearchExpression],
        limit: Option<usize>,
    ) -> Result<Vec<DatasetDoc>> {
        let matched = self
            .datasets
            .iter()
            .filter(|d| matches_expressions(d, expressions))
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok(matched)
    }

    async fn get(&self, id: DatasetId) -> Result<Option<DatasetDoc>> {
        Ok(self.datasets.iter().find(|d| d.id == id).cloned())
    }

    async fn datasets_for_location(&self, uri: &str) -> Result<Vec<DatasetDoc>> {
        Ok(self
            .datasets
            .iter()
            .filter(|d| d.uris.iter().any(|u| u == uri))
            .cloned()
            .collect())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

fn scene(product: &str, dir: &std::path::Path, datetime: &str) -> DatasetDoc {
    std::fs::write(dir.join("red.tif"), b"red-pixels").unwrap();
    std::fs::write(dir.join("green.tif"), b"green-pixels").unwrap();
    DatasetDoc {
        id: DatasetId::new(Uuid::new_v4()),
        product: product.into(),
        uris: vec![format!("file://{}", dir.display())],
        center_time: Some(
            DateTime::parse_from_rfc3339(datetime)
                .unwrap()
                .with_timezone(&Utc),
        ),
        metadata: json!({"properties": {"datetime": datetime}}),
    }
}

fn settings_yaml(output: &std::path::Path) -> String {
    format!(
        r#"
version: "1.0"
specification:
  product: ls8_level1_scene
  measurements: [red, green]
  transform: passthrough
output:
  location: {}
  metadata:
    institution: GA
"#,
        output.display()
    )
}

#[tokio::test]
async fn settings_to_finished_outputs() {
    let scene_a = tempfile::tempdir().unwrap();
    let scene_b = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();

    let index = MemoryIndex {
        datasets: vec![
            scene("ls8_level1_scene", scene_a.path(), "2020-03-10T01:00:00Z"),
            scene("ls8_level1_scene", scene_b.path(), "2020-08-21T01:00:00Z"),
            scene(
                "s2a_ard_granule",
                tempfile::tempdir().unwrap().path(),
                "2020-03-11T01:00:00Z",
            ),
        ],
    };

    let settings = config::parse_settings_str(&settings_yaml(out.path())).unwrap();
    config::validate_settings(&settings).unwrap();

    // Product comes from the settings; time narrows to the first scene only.
    let expressions = parse_expressions(&["time in [2020-01, 2020-06]"]).unwrap();
    let tasks = generate::generate_tasks(&index, &settings, &expressions, None)
        .await
        .unwrap();
    assert_eq!(tasks.len(), 1);

    let summary = Executor::new().execute_all(&tasks).await;
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 0);

    let task_dir = out
        .path()
        .join("ls8_level1_scene")
        .join(tasks[0].dataset.id.to_string());
    assert!(task_dir.join("red.tif").is_file());
    assert!(task_dir.join("green.tif").is_file());

    let doc: serde_json::Value =
        serde_json::from_slice(&std::fs::read(task_dir.join(METADATA_FILE)).unwrap()).unwrap();
    assert_eq!(doc["product"], "ls8_level1_scene");
    assert_eq!(doc["transform"], "passthrough");
    assert_eq!(doc["properties"]["institution"], "GA");
}

#[tokio::test]
async fn limit_caps_generated_tasks() {
    let scene_a = tempfile::tempdir().unwrap();
    let scene_b = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();

    let index = MemoryIndex {
        datasets: vec![
            scene("ls8_level1_scene", scene_a.path(), "2020-03-10T01:00:00Z"),
            scene("ls8_level1_scene", scene_b.path(), "2020-08-21T01:00:00Z"),
        ],
    };

    let settings = config::parse_settings_str(&settings_yaml(out.path())).unwrap();
    let tasks = generate::generate_tasks(&index, &settings, &[], Some(1))
        .await
        .unwrap();
    assert_eq!(tasks.len(), 1);
}

#[tokio::test]
async fn run_one_resolves_id_and_location() {
    let scene_dir = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();

    let dataset = scene("ls8_level1_scene", scene_dir.path(), "2020-03-10T01:00:00Z");
    let id = dataset.id;
    let uri = dataset.uris[0].clone();
    let index = MemoryIndex {
        datasets: vec![dataset],
    };

    let settings = config::parse_settings_str(&settings_yaml(out.path())).unwrap();

    let by_id = generate::generate_task(&index, &settings, &id.to_string())
        .await
        .unwrap();
    assert_eq!(by_id.dataset.id, id);

    let by_location = generate::generate_task(&index, &settings, &uri).await.unwrap();
    assert_eq!(by_location.dataset.id, id);

    let missing = generate::generate_task(&index, &settings, "file:///no/such/scene").await;
    assert!(missing.is_err());

    let unknown_id = generate::generate_task(&index, &settings, &Uuid::new_v4().to_string()).await;
    assert!(unknown_id.is_err());
}

#[tokio::test]
async fn queued_task_round_trips_and_executes() {
    use alchemist_engine::queue::{decode_task, encode_task};

    let scene_dir = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();

    let dataset = scene("ls8_level1_scene", scene_dir.path(), "2020-03-10T01:00:00Z");
    let settings = config::parse_settings_str(&settings_yaml(out.path())).unwrap();
    let task = alchemist_types::task::Task::new(dataset, settings);

    // What a worker pulls is byte-for-byte what was pushed.
    let encoded = encode_task(&task).unwrap();
    let pulled = decode_task(&encoded.payload).unwrap();
    assert_eq!(task, pulled);

    let report = Executor::new().execute(&pulled).await.unwrap();
    assert!(report.written.contains(&"red.tif".to_string()));
    assert!(report.written.contains(&METADATA_FILE.to_string()));
}
