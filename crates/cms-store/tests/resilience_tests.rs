use cms_store::{
    ContentKeySet, FileStorage, KeyTable, KeyValueStorage, ResilientContentStore, StorageError,
};
use cms_test_utils::FlakyStorage;
use pretty_assertions::assert_eq;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Schedule {
    sessions: Vec<String>,
    location: String,
}

fn schedule() -> Schedule {
    Schedule {
        sessions: vec!["Strategy".to_string(), "Finance".to_string()],
        location: "Main campus".to_string(),
    }
}

#[test]
fn test_write_survives_first_key_failure() {
    let storage = Arc::new(FlakyStorage::new());
    storage.fail_writes_to("content.schedule");
    let store = ResilientContentStore::new(Arc::clone(&storage));

    let report = store.write("schedule", &schedule()).unwrap();

    assert_eq!(
        report.written,
        vec![
            "content.schedule.backup".to_string(),
            "legacy.scheduleContent".to_string()
        ]
    );
    assert_eq!(report.failed.len(), 1);
    assert!(matches!(
        report.failed[0].1,
        StorageError::QuotaExceeded { .. }
    ));
    assert_eq!(store.read("schedule", Schedule::default()), schedule());
}

#[test]
fn test_corrupt_primary_falls_back_to_backup() {
    let storage = FlakyStorage::new();
    storage.inner().set("content.schedule", "{not json").unwrap();
    storage
        .inner()
        .set(
            "content.schedule.backup",
            &serde_json::to_string(&schedule()).unwrap(),
        )
        .unwrap();
    let store = ResilientContentStore::new(storage);

    assert_eq!(store.read("schedule", Schedule::default()), schedule());
}

#[test]
fn test_unreadable_key_is_skipped() {
    let storage = Arc::new(FlakyStorage::new());
    let store = ResilientContentStore::new(Arc::clone(&storage));
    store.write("schedule", &schedule()).unwrap();

    storage.fail_reads_from("content.schedule");
    storage.fail_reads_from("content.schedule.backup");

    assert_eq!(store.read("schedule", Schedule::default()), schedule());
}

#[test]
fn test_everything_corrupt_returns_default() {
    let storage = FlakyStorage::new();
    for key in ["content.schedule", "content.schedule.backup", "legacy.scheduleContent"] {
        storage.inner().set(key, "[[[").unwrap();
    }
    let store = ResilientContentStore::new(storage);

    assert_eq!(store.read("schedule", Schedule::default()), Schedule::default());
}

#[test]
fn test_legacy_key_still_read() {
    let storage = FlakyStorage::new();
    storage
        .inner()
        .set(
            "legacy.scheduleContent",
            &serde_json::to_string(&schedule()).unwrap(),
        )
        .unwrap();
    let store = ResilientContentStore::new(storage);

    assert_eq!(store.read("schedule", Schedule::default()), schedule());
}

#[test]
fn test_file_storage_round_trip_across_instances() {
    let dir = tempfile::tempdir().unwrap();

    let store = ResilientContentStore::new(FileStorage::open(dir.path()).unwrap());
    store.write("schedule", &schedule()).unwrap();
    drop(store);

    let reopened = ResilientContentStore::new(FileStorage::open(dir.path()).unwrap());
    assert_eq!(reopened.read("schedule", Schedule::default()), schedule());
}

#[test]
fn test_custom_key_table() {
    let mut table = KeyTable::empty();
    table.insert(ContentKeySet::new(
        "banner",
        vec!["banner.primary".to_string(), "banner.mirror".to_string()],
    ));
    let storage = Arc::new(FlakyStorage::new());
    let store = ResilientContentStore::with_key_table(Arc::clone(&storage), table);

    store.write("banner", "Enrol now").unwrap();

    assert_eq!(
        storage.inner().get("banner.mirror").unwrap().as_deref(),
        Some("\"Enrol now\"")
    );
    assert!(store.write("schedule", &schedule()).is_err());
}

#[tokio::test]
async fn test_subscriber_sees_writes_in_order() {
    let store = ResilientContentStore::new(FlakyStorage::new());
    let mut rx = store.subscribe();

    store.write("greeting", "Hello").unwrap();
    store.write("footer", "Contact us").unwrap();

    assert_eq!(rx.recv().await.unwrap().content_type, "greeting");
    assert_eq!(rx.recv().await.unwrap().content_type, "footer");
}
