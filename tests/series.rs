use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use tempfile::TempDir;

use construct_pulse::domain::{ConstructId, Month};
use construct_pulse::error::PulseError;
use construct_pulse::series::{IngestBatch, SeriesStore, parse_export_csv};

fn temp_store() -> (TempDir, SeriesStore) {
    let dir = TempDir::new().unwrap();
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    (dir, SeriesStore::new(root))
}

fn construct(id: &str) -> ConstructId {
    id.parse().unwrap()
}

fn month(label: &str) -> Month {
    label.parse().unwrap()
}

#[test]
fn absent_construct_loads_as_none() {
    let (_dir, store) = temp_store();
    let never_tracked = construct("cdk-databrew-cicd");
    assert_eq!(store.load_existing(&never_tracked).unwrap(), None);
    assert_eq!(store.aggregate(&never_tracked).unwrap(), None);
}

#[test]
fn first_ingest_creates_artifact() {
    let (_dir, store) = temp_store();
    let id = construct("cdk-lambda-subminute");
    let batch = IngestBatch::from_rows(&[10, 20, 5], month("2023-01"));

    let series = store.ingest(&id, &batch).unwrap();
    assert_eq!(series.len(), 3);
    assert!(store.artifact_path(&id).as_std_path().exists());

    let aggregate = store.aggregate(&id).unwrap().unwrap();
    assert_eq!(aggregate.total_downloads, 35);
    assert_eq!(aggregate.earliest_month, month("2023-01"));
}

#[test]
fn persisted_series_round_trips() {
    let (_dir, store) = temp_store();
    let id = construct("cdk-comprehend-s3olap");
    let batch = IngestBatch::from_rows(&[7, 0, 12_345], month("2024-05"));

    let written = store.ingest(&id, &batch).unwrap();
    let loaded = store.load_existing(&id).unwrap().unwrap();
    assert_eq!(loaded, written);
    assert_eq!(loaded.get(month("2024-07")), Some(12_345));
}

#[test]
fn reingesting_same_export_changes_nothing() {
    let (_dir, store) = temp_store();
    let id = construct("projen-statemachine");
    let batch = IngestBatch::from_rows(&[1, 2, 3], month("2024-01"));

    let first = store.ingest(&id, &batch).unwrap();
    let second = store.ingest(&id, &batch).unwrap();
    assert_eq!(first, second);
    assert_eq!(store.load_existing(&id).unwrap().unwrap(), first);
}

#[test]
fn overlapping_export_replaces_and_preserves() {
    let (_dir, store) = temp_store();
    let id = construct("cdk-databrew-cicd");

    store
        .ingest(&id, &IngestBatch::from_rows(&[100, 200], month("2024-01")))
        .unwrap();
    // corrected re-export overlapping 2024-02, extending into 2024-03
    let merged = store
        .ingest(&id, &IngestBatch::from_rows(&[150, 300], month("2024-02")))
        .unwrap();

    assert_eq!(merged.len(), 3);
    assert_eq!(merged.get(month("2024-01")), Some(100));
    assert_eq!(merged.get(month("2024-02")), Some(150));
    assert_eq!(merged.get(month("2024-03")), Some(300));

    let aggregate = store.aggregate(&id).unwrap().unwrap();
    assert_eq!(aggregate.total_downloads, 550);
    assert_eq!(aggregate.earliest_month, month("2024-01"));
}

#[test]
fn malformed_export_leaves_prior_series_untouched() {
    let (_dir, store) = temp_store();
    let id = construct("cdk-lambda-subminute");
    store
        .ingest(&id, &IngestBatch::from_rows(&[42], month("2023-06")))
        .unwrap();

    let err = parse_export_csv("10\nnot-a-number\n").unwrap_err();
    assert_matches!(err, PulseError::MalformedInput(_));

    let series = store.load_existing(&id).unwrap().unwrap();
    assert_eq!(series.len(), 1);
    assert_eq!(series.get(month("2023-06")), Some(42));
}

#[test]
fn corrupt_artifact_is_a_storage_error() {
    let (_dir, store) = temp_store();
    let id = construct("cdk-databrew-cicd");
    let path = store.artifact_path(&id);
    std::fs::create_dir_all(path.parent().unwrap().as_std_path()).unwrap();
    std::fs::write(path.as_std_path(), b"this is not gzip").unwrap();

    let err = store.load_existing(&id).unwrap_err();
    assert_matches!(err, PulseError::Storage(_));
}

#[test]
fn sibling_constructs_use_separate_artifacts() {
    let (_dir, store) = temp_store();
    let first = construct("cdk-databrew-cicd");
    let second = construct("cdk-lambda-subminute");

    store
        .ingest(&first, &IngestBatch::from_rows(&[10], month("2024-01")))
        .unwrap();
    store
        .ingest(&second, &IngestBatch::from_rows(&[20], month("2024-01")))
        .unwrap();

    assert_eq!(
        store.aggregate(&first).unwrap().unwrap().total_downloads,
        10
    );
    assert_eq!(
        store.aggregate(&second).unwrap().unwrap().total_downloads,
        20
    );
}
