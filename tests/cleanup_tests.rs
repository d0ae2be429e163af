mod common;

use common::{jpeg, record};
use occurrence_sweep::storage::{InMemoryRepository, OccurrenceRepository, PhotoStore};
use occurrence_sweep::sweep::{find_duplicates, CleanupExecutor, PurgeStatus};
use occurrence_sweep::ScanScope;
use std::fs;
use std::sync::Arc;
use tempfile::tempdir;

const PHOTOS: [&str; 4] = ["n1.jpg", "n2.jpg", "n3.jpg", "n4.jpg"];

fn store_with_photos(dir: &std::path::Path, names: &[&str]) -> PhotoStore {
    let store = PhotoStore::new(dir);
    for (i, name) in names.iter().enumerate() {
        store.write(name, &jpeg(i as u8)).unwrap();
    }
    store
}

#[test]
fn test_purge_marks_record_and_removes_all_photos() {
    let tmp = tempdir().unwrap();
    let store = store_with_photos(tmp.path(), &PHOTOS);
    let target = record(1, "device-a").photos(PHOTOS).build();
    let repository = Arc::new(InMemoryRepository::with_records(vec![target.clone()]));

    let executor = CleanupExecutor::new(repository.clone(), store.clone(), 2).unwrap();
    let outcomes = executor.purge(&[target]);

    assert_eq!(outcomes.len(), 1);
    assert_eq!(
        outcomes[0].status,
        PurgeStatus::Purged {
            files_removed: 4,
            files_missing: 0,
            files_failed: 0
        }
    );
    assert!(repository.get("row-1").unwrap().deleted_by_system);
    for name in PHOTOS {
        assert!(!store.exists(name), "{} should be gone", name);
    }
}

#[test]
fn test_purging_twice_tolerates_missing_files() {
    let tmp = tempdir().unwrap();
    let store = store_with_photos(tmp.path(), &["n1.jpg", "n2.jpg"]);
    let target = record(1, "device-a")
        .photos(["n1.jpg", "n2.jpg", "", ""])
        .build();
    let repository = Arc::new(InMemoryRepository::with_records(vec![target.clone()]));
    let executor = CleanupExecutor::new(repository.clone(), store, 1).unwrap();

    let first = executor.purge(std::slice::from_ref(&target));
    assert!(first[0].is_purged());

    let second = executor.purge(std::slice::from_ref(&target));
    assert_eq!(
        second[0].status,
        PurgeStatus::Purged {
            files_removed: 0,
            files_missing: 2,
            files_failed: 0
        }
    );
    assert!(repository.get("row-1").unwrap().deleted_by_system);
}

#[test]
fn test_flag_stays_set_when_one_photo_cannot_be_removed() {
    let tmp = tempdir().unwrap();
    let store = store_with_photos(tmp.path(), &["n1.jpg", "n2.jpg", "n4.jpg"]);
    // A directory under the photo name makes the file removal fail.
    fs::create_dir(tmp.path().join("n3.jpg")).unwrap();

    let target = record(1, "device-a").photos(PHOTOS).build();
    let repository = Arc::new(InMemoryRepository::with_records(vec![target.clone()]));
    let executor = CleanupExecutor::new(repository.clone(), store.clone(), 2).unwrap();

    let outcomes = executor.purge(&[target]);

    assert_eq!(
        outcomes[0].status,
        PurgeStatus::Purged {
            files_removed: 3,
            files_missing: 0,
            files_failed: 1
        }
    );
    assert!(repository.get("row-1").unwrap().deleted_by_system);
    assert!(!store.exists("n1.jpg"));
    assert!(!store.exists("n2.jpg"));
    assert!(!store.exists("n4.jpg"));
    assert!(tmp.path().join("n3.jpg").is_dir());
}

#[test]
fn test_failed_update_skips_files_without_blocking_other_records() {
    let tmp = tempdir().unwrap();
    let store = store_with_photos(tmp.path(), &["a.jpg", "b.jpg"]);
    let failing = record(1, "device-a").photo("a.jpg").build();
    let healthy = record(2, "device-b").photo("b.jpg").build();

    let repository = Arc::new(InMemoryRepository::with_records(vec![
        failing.clone(),
        healthy.clone(),
    ]));
    repository.fail_updates_for("row-1");

    let executor = CleanupExecutor::new(repository.clone(), store.clone(), 2).unwrap();
    let outcomes = executor.purge(&[failing, healthy]);

    assert_eq!(outcomes[0].row_id, "row-1");
    assert!(matches!(outcomes[0].status, PurgeStatus::Failed(_)));
    assert!(store.exists("a.jpg"));
    assert!(!repository.get("row-1").unwrap().deleted_by_system);

    assert_eq!(outcomes[1].row_id, "row-2");
    assert!(outcomes[1].is_purged());
    assert!(!store.exists("b.jpg"));
    assert!(repository.get("row-2").unwrap().deleted_by_system);
}

#[test]
fn test_unknown_row_leaves_photos_alone() {
    let tmp = tempdir().unwrap();
    let store = store_with_photos(tmp.path(), &["a.jpg"]);
    let stray = record(99, "device-a").photo("a.jpg").build();
    let repository = Arc::new(InMemoryRepository::new());

    let executor = CleanupExecutor::new(repository, store.clone(), 1).unwrap();
    let outcomes = executor.purge(&[stray]);

    assert!(!outcomes[0].is_purged());
    assert!(store.exists("a.jpg"));
}

#[test]
fn test_purge_touches_only_the_selected_row() {
    let tmp = tempdir().unwrap();
    let store = store_with_photos(tmp.path(), &["a.jpg", "b.jpg"]);
    let older = record(1, "device-a").photo("a.jpg").build();
    let newer = record(2, "device-a").photo("b.jpg").build();
    let repository = Arc::new(InMemoryRepository::with_records(vec![
        older.clone(),
        newer,
    ]));

    let executor = CleanupExecutor::new(repository.clone(), store.clone(), 1).unwrap();
    executor.purge(&[older]);

    assert!(repository.get("row-1").unwrap().deleted_by_system);
    assert!(!repository.get("row-2").unwrap().deleted_by_system);
    assert!(store.exists("b.jpg"));
}

#[test]
fn test_chain_of_three_leaves_last_submission_live() {
    let tmp = tempdir().unwrap();
    let store = PhotoStore::new(tmp.path());
    for name in ["a.jpg", "b.jpg", "c.jpg"] {
        store.write(name, &jpeg(5)).unwrap();
    }
    let repository = Arc::new(InMemoryRepository::with_records(vec![
        record(1, "device-a").photo("a.jpg").build(),
        record(2, "device-a").photo("b.jpg").build(),
        record(3, "device-a").photo("c.jpg").build(),
    ]));

    let records = repository
        .fetch_for_duplicate_scan(ScanScope::AllProduction)
        .unwrap();
    let duplicates = find_duplicates(&records, &store);
    let executor = CleanupExecutor::new(repository.clone(), store.clone(), 4).unwrap();
    let outcomes = executor.purge(&duplicates);

    assert_eq!(outcomes.iter().filter(|o| o.is_purged()).count(), 2);
    assert!(repository.get("row-1").unwrap().deleted_by_system);
    assert!(repository.get("row-2").unwrap().deleted_by_system);
    assert!(repository.get("row-3").unwrap().is_live());
    assert!(store.exists("c.jpg"));
}
