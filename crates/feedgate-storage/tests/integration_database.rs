//! Integration tests for the database handle
//!
//! Covers in-memory and file-backed databases, migrations, and serialised
//! access from concurrent tasks through the single pooled connection.
//!
//! Run with: cargo test --package feedgate-storage --test integration_database

use chrono::{TimeZone, Utc};
use feedgate_core::{AnimalId, Clock, ManualClock};
use feedgate_storage::connection::{Database, DatabaseConfig};
use feedgate_storage::{FeedingAuthorizer, FeedingPolicy, StorageError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Barrier;

#[tokio::test]
async fn test_in_memory_database() {
    let db = Database::in_memory().await.unwrap();
    db.health_check().await.unwrap();
    db.close().await;
}

#[tokio::test]
async fn test_migration_idempotency() {
    let db = Database::in_memory().await.unwrap();

    db.migrate().await.unwrap();
    db.migrate().await.unwrap();

    let result: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN ('animals', 'feeding_events')",
    )
    .fetch_one(db.pool())
    .await
    .unwrap();

    assert_eq!(result.0, 2);

    db.close().await;
}

#[tokio::test]
async fn test_foreign_keys_enforced() {
    let db = Database::in_memory().await.unwrap();

    let result = sqlx::query("INSERT INTO feeding_events (animal_id, fed_at, quantity) VALUES (1, 0, 1.0)")
        .execute(db.pool())
        .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_concurrent_feedings_are_serialised() {
    let db = Database::in_memory().await.unwrap();
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 3, 10, 6, 0, 0).unwrap());
    let authorizer =
        Arc::new(FeedingAuthorizer::new(db, clock.clone(), FeedingPolicy::new(0.5, 0)).unwrap());
    let animal = AnimalId::new(42).unwrap();
    authorizer.register_animal(animal, 10.0).await.unwrap();

    const NUM_CONCURRENT_TASKS: usize = 10;
    let barrier = Arc::new(Barrier::new(NUM_CONCURRENT_TASKS));
    let now = clock.now().unwrap();

    let mut handles = vec![];
    for _ in 0..NUM_CONCURRENT_TASKS {
        let authorizer = authorizer.clone();
        let barrier = barrier.clone();

        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            authorizer.record_feeding(animal, 0.5, now).await
        }));
    }

    for result in futures::future::join_all(handles).await {
        result.unwrap().unwrap();
    }

    let state = authorizer.quota_state(animal).await.unwrap();
    assert_eq!(state.consumed_today, 5.0);
    assert_eq!(authorizer.history(animal, 100).await.unwrap().len(), 10);
}

#[tokio::test]
async fn test_file_backed_database_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("feedgate.db");
    let path = path.to_str().unwrap().to_string();
    let t0 = Utc.with_ymd_and_hms(2025, 3, 10, 6, 0, 0).unwrap();
    let animal = AnimalId::new(7).unwrap();

    {
        let db = Database::new(DatabaseConfig::new(&path)).await.unwrap();
        let authorizer =
            FeedingAuthorizer::new(db.clone(), ManualClock::new(t0), FeedingPolicy::default())
                .unwrap();
        authorizer.register_animal(animal, 3.0).await.unwrap();
        authorizer.record_feeding(animal, 1.0, t0).await.unwrap();
        db.close().await;
    }

    let db = Database::new(DatabaseConfig::new(&path)).await.unwrap();
    let authorizer =
        FeedingAuthorizer::new(db.clone(), ManualClock::new(t0), FeedingPolicy::default()).unwrap();

    let state = authorizer.quota_state(animal).await.unwrap();
    assert_eq!(state.daily_quota, 3.0);
    assert_eq!(state.consumed_today, 1.0);
    assert_eq!(state.last_fed_at, Some(t0));

    let result = authorizer.register_animal(animal, 3.0).await;
    assert!(matches!(result, Err(StorageError::DuplicateAnimal { .. })));

    let mode: (String,) = sqlx::query_as("PRAGMA journal_mode")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(mode.0.to_lowercase(), "wal");

    db.close().await;
}

#[tokio::test]
async fn test_missing_database_without_create() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.db");

    let config = DatabaseConfig::new(path.to_str().unwrap())
        .create_if_missing(false)
        .operation_timeout(Duration::from_secs(1));
    let result = Database::new(config).await;

    assert!(matches!(result, Err(StorageError::Database(_))));
}
