//! SQLite Backend Integration Tests
//!
//! Tests that need a real database file:
//! - Persistence across connections
//! - Several tables sharing one file
//! - Concurrent writers on separate connections
//! - Batch rollback on disk
//! - Corrupt stored values

mod common;

use common::{User, init_logging, site_config};
use rsettings::{Error, MemoryBackend, RecordStore, SettingsConfig, SettingsStore, SqliteBackend};
use serde_json::json;
use std::path::Path;
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::TempDir;

fn open_store(path: &Path) -> SettingsStore<SqliteBackend> {
    init_logging();
    SettingsStore::new(site_config(), SqliteBackend::open(path).unwrap())
}

#[test]
fn test_values_survive_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("settings.db");

    {
        let store = open_store(&path);
        store.set("theme", "dark").unwrap();
        store.for_owner(&User(1)).set("per_page", 42).unwrap();
    }

    let store = open_store(&path);
    assert_eq!(store.get("theme").unwrap(), Some(json!("dark")));
    assert_eq!(store.for_owner(&User(1)).get("per_page").unwrap(), Some(json!(42)));
    assert_eq!(store.get("per_page").unwrap(), Some(json!(20)));
}

#[test]
fn test_tables_share_a_file_without_mixing() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("settings.db");

    let site = open_store(&path);
    let prefs = SettingsStore::new(
        SettingsConfig::builder("user_prefs").build().unwrap(),
        SqliteBackend::open(&path).unwrap(),
    );

    site.set("theme", "dark").unwrap();
    prefs.set("theme", "anything goes").unwrap();

    assert_eq!(site.get("theme").unwrap(), Some(json!("dark")));
    assert_eq!(prefs.get("theme").unwrap(), Some(json!("anything goes")));
    assert_eq!(prefs.get_all().unwrap().len(), 1);
}

#[test]
fn test_concurrent_writers_never_duplicate() {
    const WRITERS: usize = 4;
    const ROUNDS: usize = 10;

    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("settings.db");
    // Create the schema before the race starts
    drop(open_store(&path));

    for round in 0..ROUNDS {
        let key_owner = User(round as u64);
        let barrier = Arc::new(Barrier::new(WRITERS));

        let outcomes: Vec<rsettings::Result<serde_json::Value>> = thread::scope(|scope| {
            let handles: Vec<_> = (0..WRITERS)
                .map(|writer| {
                    let barrier = Arc::clone(&barrier);
                    let path = path.clone();
                    let key_owner = &key_owner;
                    scope.spawn(move || {
                        let store = open_store(&path).for_owner(key_owner);
                        barrier.wait();
                        store.set("per_page", (writer + 1) as u64)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        // Losers of the race see a uniqueness violation, never a storage error
        for outcome in &outcomes {
            if let Err(err) = outcome {
                let violations = err.violations().expect("only validation errors");
                assert_eq!(violations[0].rule, "uniqueness");
            }
        }
        assert!(outcomes.iter().any(Result::is_ok));

        let store = open_store(&path).for_owner(&key_owner);
        let records = store
            .backend()
            .list(store.config().table(), store.scope())
            .unwrap();
        assert_eq!(records.len(), 1, "round {round}");
    }
}

#[test]
fn test_memory_clones_race_like_connections() {
    init_logging();
    let backend = MemoryBackend::new();
    let barrier = Arc::new(Barrier::new(8));

    thread::scope(|scope| {
        for n in 0..8 {
            let backend = backend.clone();
            let barrier = Arc::clone(&barrier);
            scope.spawn(move || {
                let store = SettingsStore::new(site_config(), backend);
                barrier.wait();
                let _ = store.set("per_page", n + 1);
            });
        }
    });

    assert_eq!(backend.len(), 1);
}

#[test]
fn test_batch_rollback_on_disk() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("settings.db");

    let store = open_store(&path);
    store.set("per_page", 10).unwrap();

    let err = store
        .set_many([("per_page", json!(11)), ("theme", json!("neon"))])
        .unwrap_err();
    assert!(matches!(err, Error::Invalid(_)));

    // A fresh connection sees only committed data
    let reader = open_store(&path);
    assert_eq!(reader.get("per_page").unwrap(), Some(json!(10)));
    assert_eq!(reader.get("theme").unwrap(), Some(json!("light")));
}

#[test]
fn test_corrupt_value_is_decode_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("settings.db");

    let store = open_store(&path);
    store.set("extra", json!({"ok": true})).unwrap();

    let raw = rusqlite::Connection::open(&path).unwrap();
    raw.execute("UPDATE settings SET value = '{broken' WHERE key = 'extra'", [])
        .unwrap();

    assert!(matches!(store.get("extra"), Err(Error::Decode { codec: "json", .. })));
    assert!(matches!(store.get_all(), Err(Error::Decode { .. })));
    // Other keys are unaffected
    assert_eq!(store.get("theme").unwrap(), Some(json!("light")));
}

#[test]
fn test_half_populated_owner_is_rejected_by_schema() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("settings.db");
    drop(open_store(&path));

    let raw = rusqlite::Connection::open(&path).unwrap();
    let result = raw.execute(
        "INSERT INTO settings (table_name, key, value, owner_type, owner_id, created_at, updated_at)
         VALUES ('site_settings', 'theme', '\"dark\"', 'User', NULL, '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z')",
        [],
    );
    assert!(result.is_err());
}
