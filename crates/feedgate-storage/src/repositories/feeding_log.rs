#![allow(async_fn_in_trait)]

use crate::error::StorageResult;
use crate::models::{FeedingEvent, to_unix};
use crate::transaction;
use chrono::{DateTime, Utc};
use feedgate_core::AnimalId;
use sqlx::SqlitePool;

/// Repository trait for the append-only feeding log
///
/// There is no update or delete: events are the audit trail.
pub trait FeedingLogRepository: Send + Sync {
    /// Append one event, returning its row ID
    ///
    /// Does not touch the quota counter. `FeedingAuthorizer::record_feeding`
    /// appends through [`transaction::append_feeding_event`] inside the
    /// transaction that also credits the animal.
    async fn append(&self, event: &FeedingEvent) -> StorageResult<i64>;

    /// Total quantity fed to `animal_id` in `[start, end)`
    ///
    /// Returns 0.0 when nothing matches, including for unknown animals.
    async fn sum_in_range(
        &self,
        animal_id: AnimalId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StorageResult<f64>;

    /// Most recent events for an animal, newest first
    async fn find_by_animal(&self, animal_id: AnimalId, limit: i64)
    -> StorageResult<Vec<FeedingEvent>>;
}

/// SQLite implementation of FeedingLogRepository
pub struct SqliteFeedingLogRepository {
    pool: SqlitePool,
}

impl SqliteFeedingLogRepository {
    /// Create a new SQLite feeding log repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl FeedingLogRepository for SqliteFeedingLogRepository {
    async fn append(&self, event: &FeedingEvent) -> StorageResult<i64> {
        let mut tx = self.pool.begin().await?;
        let id = transaction::append_feeding_event(&mut tx, event).await?;
        tx.commit().await?;
        Ok(id)
    }

    async fn sum_in_range(
        &self,
        animal_id: AnimalId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StorageResult<f64> {
        let result: (f64,) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(quantity), 0.0)
            FROM feeding_events
            WHERE animal_id = ? AND fed_at >= ? AND fed_at < ?
            "#,
        )
        .bind(animal_id.as_i64())
        .bind(to_unix(start))
        .bind(to_unix(end))
        .fetch_one(&self.pool)
        .await?;

        Ok(result.0)
    }

    async fn find_by_animal(
        &self,
        animal_id: AnimalId,
        limit: i64,
    ) -> StorageResult<Vec<FeedingEvent>> {
        let events = sqlx::query_as::<_, FeedingEvent>(
            r#"
            SELECT id, animal_id, fed_at, quantity
            FROM feeding_events
            WHERE animal_id = ?
            ORDER BY fed_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(animal_id.as_i64())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }
}
