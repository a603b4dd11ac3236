//! End-to-end scenarios for the sync engine.
//!
//! The in-memory mock plays the remote store, so every scenario runs
//! without a network: cold start, offline round trips, queue drains,
//! failure and auth-expiry handling, conflict resolution, and the
//! import/export paths.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use serde_json::json;

use journal_sync::{
    EngineOptions, EntryDraft, EntryType, EntryUpdate, FieldValue, FixedClock, ImportError,
    InMemoryState, MockRemoteStore, Notes, RemoteStore, Severity, SyncEngine, SyncStatus,
};

fn fixed_now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 8, 6, 9, 0, 0).unwrap()
}

fn test_engine() -> (Arc<MockRemoteStore>, Arc<InMemoryState>, SyncEngine) {
    let store = Arc::new(MockRemoteStore::new());
    let local = Arc::new(InMemoryState::new());
    let engine = SyncEngine::new(
        store.clone(),
        local.clone(),
        EngineOptions {
            user_key: "user-1".to_string(),
            timezone: chrono_tz::UTC,
            clock: Arc::new(FixedClock(fixed_now())),
        },
    );
    (store, local, engine)
}

fn quick_draft(item: &str, value: i64) -> EntryDraft {
    EntryDraft::new(EntryType::Quick).score(item, FieldValue::Scale(value))
}

// --- Cold start ---

#[tokio::test]
async fn new_user_cold_start_creates_default_config() {
    let (store, _local, engine) = test_engine();
    engine.boot().await.unwrap();

    let config = engine.load_config().await.unwrap();
    assert!(!config.onboarding.completed);
    assert_eq!(config.user_id, "user-1");

    // The default was persisted remotely too.
    let remote = store.get_config_file("user-1").await.unwrap().unwrap();
    assert_eq!(remote["user_id"], "user-1");

    // First morning entry creates exactly one entry.
    engine
        .add_entry(EntryDraft::new(EntryType::Morning).score("sleep_quality", FieldValue::Scale(4)))
        .await
        .unwrap();
    assert_eq!(engine.visible_entries().len(), 1);

    // A second load returns the cached configuration.
    let again = engine.load_config().await.unwrap();
    assert_eq!(*again, *config);
}

#[tokio::test]
async fn boot_rehydrates_before_any_remote_call() {
    let (store, local, engine) = test_engine();

    // Seed persisted local state: one entry, one queued.
    {
        let (seed_store, seed_local, seed_engine) = test_engine();
        seed_engine.boot().await.unwrap();
        seed_engine.set_online_status(false).await;
        seed_engine
            .add_entry(quick_draft("hot_flash_intensity", 3))
            .await
            .unwrap();
        local.seed(seed_local.stored().unwrap());
        drop((seed_store, seed_engine));
    }

    engine.boot().await.unwrap();
    let snapshot = engine.snapshot();
    assert_eq!(snapshot.entries.len(), 1);
    assert_eq!(snapshot.offline_entries.len(), 1);
    // Rehydration touched the remote store not at all.
    assert_eq!(store.call_count(), 0);
}

// --- Per-day semantics ---

#[tokio::test]
async fn morning_entries_collapse_onto_one_per_day() {
    let (_store, _local, engine) = test_engine();
    engine.boot().await.unwrap();

    let first = engine
        .add_entry(EntryDraft::new(EntryType::Morning).score("sleep_quality", FieldValue::Scale(2)))
        .await
        .unwrap();
    let second = engine
        .add_entry(EntryDraft::new(EntryType::Morning).score("energy_level", FieldValue::Scale(4)))
        .await
        .unwrap();

    // Same entry, updated in place.
    assert_eq!(first.id, second.id);
    let morning: Vec<_> = engine
        .visible_entries()
        .into_iter()
        .filter(|e| e.entry_type == EntryType::Morning)
        .collect();
    assert_eq!(morning.len(), 1);
    assert_eq!(morning[0].scores["sleep_quality"], FieldValue::Scale(2));
    assert_eq!(morning[0].scores["energy_level"], FieldValue::Scale(4));
}

#[tokio::test]
async fn quick_entries_never_collapse() {
    let (_store, _local, engine) = test_engine();
    engine.boot().await.unwrap();

    for i in 1..=3 {
        engine
            .add_entry(quick_draft("hot_flash_intensity", i))
            .await
            .unwrap();
    }

    let quick: Vec<_> = engine
        .visible_entries()
        .into_iter()
        .filter(|e| e.entry_type == EntryType::Quick)
        .collect();
    assert_eq!(quick.len(), 3);
}

// --- Soft delete ---

#[tokio::test]
async fn soft_delete_is_reversible() {
    let (_store, _local, engine) = test_engine();
    engine.boot().await.unwrap();

    let original = engine
        .add_entry(quick_draft("hot_flash_intensity", 4))
        .await
        .unwrap();

    let deleted = engine.delete_entry(&original.id).await.unwrap();
    assert!(deleted.is_deleted);
    assert!(engine.visible_entries().is_empty());
    // Still in storage, just filtered.
    assert_eq!(engine.all_entries().len(), 1);

    let restored = engine.restore_entry(&original.id).await.unwrap();
    assert!(!restored.is_deleted);
    assert_eq!(restored.id, original.id);
    assert_eq!(restored.timestamp, original.timestamp);
    assert_eq!(restored.scores, original.scores);
    assert_eq!(restored.created_at, original.created_at);
    assert_eq!(engine.visible_entries().len(), 1);
}

// --- Offline round trip ---

#[tokio::test]
async fn offline_round_trip_drains_exactly_once() {
    let (store, _local, engine) = test_engine();
    engine.boot().await.unwrap();

    engine.set_online_status(false).await;
    let entry = engine
        .add_entry(quick_draft("hot_flash_intensity", 3))
        .await
        .unwrap();

    // Optimistic state: visible immediately, pending, queued.
    assert_eq!(entry.sync_status, SyncStatus::Pending);
    let snapshot = engine.snapshot();
    assert_eq!(snapshot.entries.len(), 1);
    assert_eq!(snapshot.offline_entries.len(), 1);
    // Nothing touched the remote while offline.
    assert_eq!(store.call_count(), 0);

    engine.set_online_status(true).await;

    let snapshot = engine.snapshot();
    assert!(snapshot.offline_entries.is_empty());
    assert!(snapshot.last_sync_time.is_some());
    assert_eq!(
        engine.entry(&entry.id).unwrap().sync_status,
        SyncStatus::Synced
    );
    // One batched call drained the whole queue.
    assert_eq!(store.call_count(), 1);

    let remote = store.monthly_file("2026-08").unwrap();
    assert_eq!(remote.entries.len(), 1);
    assert_eq!(remote.entries[0].sync_status, SyncStatus::Synced);
}

#[tokio::test]
async fn failed_drain_keeps_the_queue_intact() {
    let (store, _local, engine) = test_engine();
    engine.boot().await.unwrap();

    engine.set_online_status(false).await;
    for i in 1..=3 {
        engine
            .add_entry(quick_draft("hot_flash_intensity", i))
            .await
            .unwrap();
    }

    store.fail_next(1);
    engine.set_online_status(true).await;

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.offline_entries.len(), 3);
    assert!(!snapshot.sync_errors.is_empty());
    assert!(!snapshot.is_syncing);

    // Manual retry drains it.
    engine.sync_offline_entries().await;
    assert!(engine.snapshot().offline_entries.is_empty());
}

#[tokio::test]
async fn offline_updates_requeue_by_id() {
    let (_store, _local, engine) = test_engine();
    engine.boot().await.unwrap();

    engine.set_online_status(false).await;
    let entry = engine
        .add_entry(quick_draft("hot_flash_intensity", 2))
        .await
        .unwrap();
    engine
        .update_entry(
            &entry.id,
            EntryUpdate::default().score("hot_flash_intensity", FieldValue::Scale(5)),
        )
        .await
        .unwrap();

    // The queue holds one copy of the entry, the fresh one.
    let snapshot = engine.snapshot();
    assert_eq!(snapshot.offline_entries.len(), 1);
    assert_eq!(
        snapshot.offline_entries[0].scores["hot_flash_intensity"],
        FieldValue::Scale(5)
    );
}

// --- Failure handling ---

#[tokio::test]
async fn sync_failure_marks_failed_and_retry_recovers() {
    let (store, _local, engine) = test_engine();
    engine.boot().await.unwrap();

    store.fail_next(1);
    let entry = engine
        .add_entry(quick_draft("hot_flash_intensity", 3))
        .await
        .unwrap();

    assert_eq!(entry.sync_status, SyncStatus::Failed);
    assert!(!engine.snapshot().sync_errors.is_empty());

    // Failed is always retry-eligible.
    engine.retry_failed_entries().await;
    assert_eq!(
        engine.entry(&entry.id).unwrap().sync_status,
        SyncStatus::Synced
    );
}

#[tokio::test]
async fn auth_expiry_resets_auth_and_leaves_entries_pending() {
    let (store, _local, engine) = test_engine();
    engine.boot().await.unwrap();

    store.expire_auth();
    let entry = engine
        .add_entry(quick_draft("hot_flash_intensity", 3))
        .await
        .unwrap();

    // Not a data failure: pending, not failed.
    assert_eq!(entry.sync_status, SyncStatus::Pending);
    assert!(engine.snapshot().auth_reset_required);

    store.restore_auth();
    engine.clear_auth_reset();
    engine.sync_entry(&entry.id).await.unwrap();
    assert_eq!(
        engine.entry(&entry.id).unwrap().sync_status,
        SyncStatus::Synced
    );
}

#[tokio::test]
async fn validation_failure_surfaces_field_errors() {
    let (_store, _local, engine) = test_engine();
    engine.boot().await.unwrap();
    let mut notifications = engine.subscribe();

    let result = engine
        .add_entry(EntryDraft::new(EntryType::Morning).score("energy_level", FieldValue::Scale(6)))
        .await;

    match result {
        Err(journal_sync::EntryError::Validation(errors)) => {
            assert!(errors.iter().any(|e| e.field == "energy_level"));
        }
        other => panic!("expected validation error, got {other:?}"),
    }
    assert!(engine.visible_entries().is_empty());

    let note = notifications.try_recv().unwrap();
    assert_eq!(note.severity, Severity::Error);
}

#[tokio::test]
async fn successful_mutation_emits_one_notification() {
    let (_store, _local, engine) = test_engine();
    engine.boot().await.unwrap();
    let mut notifications = engine.subscribe();

    engine
        .add_entry(quick_draft("hot_flash_intensity", 2))
        .await
        .unwrap();

    let note = notifications.try_recv().unwrap();
    assert_eq!(note.severity, Severity::Success);
    assert!(notifications.try_recv().is_err());
}

// --- Conflict resolution ---

#[tokio::test]
async fn newer_remote_copy_wins_on_sync() {
    let (store, _local, engine) = test_engine();
    engine.boot().await.unwrap();

    let entry = engine
        .add_entry(quick_draft("hot_flash_intensity", 2))
        .await
        .unwrap();

    // Another device pushed a newer copy of the same entry.
    let mut remote_file = store.monthly_file("2026-08").unwrap();
    let remote_entry = remote_file
        .entries
        .iter_mut()
        .find(|e| e.id == entry.id)
        .unwrap();
    remote_entry
        .scores
        .insert("mood".to_string(), FieldValue::Scale(5));
    remote_entry.updated_at = fixed_now() + chrono::Duration::hours(1);
    store.seed_file(
        "tracking-journal_2026-08.json",
        serde_json::to_value(&remote_file).unwrap(),
    );

    // A local edit stamped with the (older) fixed clock loses.
    engine
        .update_entry(
            &entry.id,
            EntryUpdate::default().score("hot_flash_intensity", FieldValue::Scale(1)),
        )
        .await
        .unwrap();

    let merged = engine.entry(&entry.id).unwrap();
    assert_eq!(merged.sync_status, SyncStatus::Synced);
    assert_eq!(merged.scores["mood"], FieldValue::Scale(5));
    assert_eq!(merged.scores["hot_flash_intensity"], FieldValue::Scale(2));
}

// --- Loading and migration ---

#[tokio::test]
async fn load_month_migrates_legacy_files() {
    let (store, _local, engine) = test_engine();
    engine.boot().await.unwrap();

    store.seed_file(
        "tracking-journal_2024-11.json",
        json!({
            "version": "1.0.0",
            "month": "2024-11",
            "created_at": "2024-11-01T00:00:00Z",
            "updated_at": "2024-11-30T21:00:00Z",
            "entries": [{
                "id": "legacy-1",
                "timestamp": "2024-11-12T08:00:00Z",
                "type": "morning",
                "brain_fog": 2
            }]
        }),
    );

    let merged = engine.load_month("2024-11").await.unwrap();
    assert_eq!(merged, 1);

    let entry = engine.entry("legacy-1").unwrap();
    // 2 on the 3-point scale stores as 3 on the canonical scale.
    assert_eq!(entry.scores["brain_fog"], FieldValue::Scale(3));
    assert_eq!(entry.sync_status, SyncStatus::Synced);
    assert_eq!(entry.timezone, "UTC");
}

#[tokio::test]
async fn load_month_with_unknown_version_fails_loudly() {
    let (store, _local, engine) = test_engine();
    engine.boot().await.unwrap();

    store.seed_file(
        "tracking-journal_2024-11.json",
        json!({"version": "9.0.0", "month": "2024-11", "entries": []}),
    );

    assert!(matches!(
        engine.load_month("2024-11").await,
        Err(journal_sync::LoadError::Migration(_))
    ));
    assert!(engine.visible_entries().is_empty());
}

// --- Import/export ---

#[tokio::test]
async fn entry_export_import_round_trip() {
    let (_store, _local, engine) = test_engine();
    engine.boot().await.unwrap();

    engine
        .add_entry(quick_draft("hot_flash_intensity", 4))
        .await
        .unwrap();
    engine
        .add_entry(
            EntryDraft::new(EntryType::Evening)
                .score("stress_level", FieldValue::Scale(3))
                .with_notes(Notes {
                    observations: Some("long day".to_string()),
                    reflections: None,
                    thankful_for: None,
                }),
        )
        .await
        .unwrap();

    let document = serde_json::to_value(engine.export_entries()).unwrap();

    let (store2, _local2, engine2) = test_engine();
    engine2.boot().await.unwrap();
    let summary = engine2.import_entries(&document).await.unwrap();

    assert_eq!(summary.entries_imported, 2);
    assert_eq!(summary.months_imported, 1);
    assert_eq!(engine2.visible_entries().len(), 2);
    assert!(engine2
        .visible_entries()
        .iter()
        .all(|e| e.sync_status == SyncStatus::Synced));
    assert_eq!(store2.monthly_file("2026-08").unwrap().entries.len(), 2);
}

#[tokio::test]
async fn malformed_import_aborts_without_writes() {
    let (store, _local, engine) = test_engine();
    engine.boot().await.unwrap();

    let result = engine.import_entries(&json!({"version": "1.3.0"})).await;
    assert!(matches!(result, Err(ImportError::Malformed(_))));
    assert_eq!(store.call_count(), 0);
    assert!(engine.visible_entries().is_empty());
}

#[tokio::test]
async fn config_export_import_round_trip() {
    let (_store, _local, engine) = test_engine();
    engine.boot().await.unwrap();

    let mut config = (*engine.load_config().await.unwrap()).clone();
    config.display_options.morning_end_hour = 10;
    engine.save_config(config.clone()).await.unwrap();

    let document = engine.export_config().await.unwrap();
    assert_eq!(document["compressed"], true);

    let (_store2, _local2, engine2) = test_engine();
    engine2.boot().await.unwrap();
    let imported = engine2.import_config(&document).await.unwrap();
    assert_eq!(imported.display_options.morning_end_hour, 10);
    assert_eq!(imported.user_id, "user-1");
}

// --- Persistence across restarts ---

#[tokio::test]
async fn state_survives_engine_restart() {
    let (store, local, engine) = test_engine();
    engine.boot().await.unwrap();
    engine.set_online_status(false).await;
    engine
        .add_entry(quick_draft("hot_flash_intensity", 3))
        .await
        .unwrap();
    drop(engine);

    // Same local port, fresh engine: the queue comes back.
    let engine2 = SyncEngine::new(
        store.clone(),
        local,
        EngineOptions {
            user_key: "user-1".to_string(),
            timezone: chrono_tz::UTC,
            clock: Arc::new(FixedClock(fixed_now())),
        },
    );
    engine2.boot().await.unwrap();

    let snapshot = engine2.snapshot();
    assert_eq!(snapshot.entries.len(), 1);
    assert_eq!(snapshot.offline_entries.len(), 1);

    engine2.set_online_status(true).await;
    assert!(engine2.snapshot().offline_entries.is_empty());
    assert!(store.monthly_file("2026-08").is_some());
}
