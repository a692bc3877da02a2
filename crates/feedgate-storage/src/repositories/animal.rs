#![allow(async_fn_in_trait)]

use crate::error::{StorageError, StorageResult};
use crate::models::{Animal, QuotaState};
use crate::transaction;
use chrono::{DateTime, Utc};
use feedgate_core::{AnimalId, Clock};
use sqlx::SqlitePool;
use tracing::debug;

/// Result of a lazy day-rollover check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetOutcome {
    /// The counter was zeroed and `last_fed_at` moved to the check instant
    WasReset,
    /// The record already belonged to the current day
    NoActionTaken,
}

impl ResetOutcome {
    pub fn was_reset(self) -> bool {
        matches!(self, Self::WasReset)
    }
}

/// Repository trait for Animal entity operations
///
/// Every mutation that reads and writes the same row runs inside a single
/// transaction, so the per-animal read-modify-write is never split across
/// statements that commit separately.
///
/// # Implementation Note
///
/// This trait uses native async trait methods (Edition 2024 feature).
pub trait AnimalRepository: Send + Sync {
    /// Register an animal with zero consumption and no feeding timestamp
    async fn register(&self, animal_id: AnimalId, daily_quota: f64) -> StorageResult<()>;

    /// Find an animal by ID
    async fn find(&self, animal_id: AnimalId) -> StorageResult<Option<Animal>>;

    /// Get the quota state, failing with `AnimalNotFound` for unknown IDs
    async fn quota_state(&self, animal_id: AnimalId) -> StorageResult<QuotaState>;

    /// Reset today's counter if the last feeding happened on another day
    ///
    /// Runs in its own transaction. `FeedingAuthorizer` does not call this:
    /// it issues the same statement through [`transaction::reset_if_stale`]
    /// so the reset and the quota read share one transaction.
    async fn ensure_daily_reset(
        &self,
        animal_id: AnimalId,
        now: DateTime<Utc>,
        clock: &dyn Clock,
    ) -> StorageResult<ResetOutcome>;

    /// Add `quantity` to today's consumption and stamp the feeding time
    ///
    /// Credits the counter without logging an event. `FeedingAuthorizer`
    /// pairs [`transaction::apply_consumption`] with the log append instead.
    async fn record_consumption(
        &self,
        animal_id: AnimalId,
        quantity: f64,
        now: DateTime<Utc>,
        clock: &dyn Clock,
    ) -> StorageResult<()>;

    /// Replace the daily quota
    async fn set_daily_quota(&self, animal_id: AnimalId, daily_quota: f64) -> StorageResult<()>;

    /// List all registered animals ordered by ID
    async fn find_all(&self) -> StorageResult<Vec<Animal>>;
}

/// SQLite implementation of AnimalRepository
pub struct SqliteAnimalRepository {
    pool: SqlitePool,
}

impl SqliteAnimalRepository {
    /// Create a new SQLite animal repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl AnimalRepository for SqliteAnimalRepository {
    async fn register(&self, animal_id: AnimalId, daily_quota: f64) -> StorageResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO animals (animal_id, daily_quota, consumed_today, last_fed_at)
            VALUES (?, ?, 0, NULL)
            ON CONFLICT (animal_id) DO NOTHING
            "#,
        )
        .bind(animal_id.as_i64())
        .bind(daily_quota)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::DuplicateAnimal { animal_id });
        }

        Ok(())
    }

    async fn find(&self, animal_id: AnimalId) -> StorageResult<Option<Animal>> {
        let animal = sqlx::query_as::<_, Animal>(
            r#"
            SELECT animal_id, daily_quota, consumed_today, last_fed_at
            FROM animals
            WHERE animal_id = ?
            "#,
        )
        .bind(animal_id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        Ok(animal)
    }

    async fn quota_state(&self, animal_id: AnimalId) -> StorageResult<QuotaState> {
        self.find(animal_id)
            .await?
            .map(|animal| animal.quota_state())
            .ok_or(StorageError::not_found(animal_id))
    }

    async fn ensure_daily_reset(
        &self,
        animal_id: AnimalId,
        now: DateTime<Utc>,
        clock: &dyn Clock,
    ) -> StorageResult<ResetOutcome> {
        let today = clock.day_bounds_at(now)?;
        let mut tx = self.pool.begin().await?;

        let outcome = if transaction::reset_if_stale(&mut tx, animal_id, now, today).await? {
            debug!(animal_id = %animal_id, "Daily counter reset");
            ResetOutcome::WasReset
        } else if transaction::animal_exists(&mut tx, animal_id).await? {
            ResetOutcome::NoActionTaken
        } else {
            return Err(StorageError::not_found(animal_id));
        };

        tx.commit().await?;
        Ok(outcome)
    }

    async fn record_consumption(
        &self,
        animal_id: AnimalId,
        quantity: f64,
        now: DateTime<Utc>,
        clock: &dyn Clock,
    ) -> StorageResult<()> {
        let today = clock.day_bounds_at(now)?;
        let mut tx = self.pool.begin().await?;
        transaction::apply_consumption(&mut tx, animal_id, quantity, now, today).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn set_daily_quota(&self, animal_id: AnimalId, daily_quota: f64) -> StorageResult<()> {
        let result = sqlx::query("UPDATE animals SET daily_quota = ? WHERE animal_id = ?")
            .bind(daily_quota)
            .bind(animal_id.as_i64())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found(animal_id));
        }

        Ok(())
    }

    async fn find_all(&self) -> StorageResult<Vec<Animal>> {
        let animals = sqlx::query_as::<_, Animal>(
            r#"
            SELECT animal_id, daily_quota, consumed_today, last_fed_at
            FROM animals
            ORDER BY animal_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(animals)
    }
}
