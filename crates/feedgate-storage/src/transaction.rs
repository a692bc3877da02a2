//! Transaction-aware statements for atomic multi-step operations.
//!
//! Each function runs one statement against an open SQLite transaction, so
//! callers can group dependent writes and commit them together. The feeder
//! relies on this for:
//!
//! - **Daily reset**: the staleness test and the reset are one conditional
//!   `UPDATE`, never a read followed by a write
//! - **Recording a feeding**: the audit row and the quota counter are
//!   committed together or not at all
//!
//! # Usage Pattern
//!
//! ```no_run
//! use chrono::Utc;
//! use feedgate_core::{AnimalId, Clock, SystemClock};
//! use feedgate_storage::{Database, transaction};
//! use feedgate_storage::models::FeedingEvent;
//!
//! # async fn example(db: Database) -> Result<(), Box<dyn std::error::Error>> {
//! let clock = SystemClock::new();
//! let now = clock.now()?;
//! let today = clock.day_bounds_at(now)?;
//! let animal_id = AnimalId::new(42)?;
//!
//! let mut tx = db.pool().begin().await?;
//! transaction::append_feeding_event(&mut tx, &FeedingEvent::new(animal_id, now, 1.0)).await?;
//! transaction::apply_consumption(&mut tx, animal_id, 1.0, now, today).await?;
//! tx.commit().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Atomic Guarantees
//!
//! If any function returns an error the transaction must not be committed;
//! roll it back explicitly or drop it.

use crate::error::{StorageError, StorageResult};
use crate::models::{Animal, FeedingEvent, QuotaState, to_unix};
use chrono::{DateTime, Utc};
use feedgate_core::AnimalId;
use sqlx::{Sqlite, Transaction};

/// Half-open `[start, end)` bounds of the current local day
pub type DayBounds = (DateTime<Utc>, DateTime<Utc>);

/// Reset an animal's daily counter if its last feeding is outside `today`
///
/// Sets `consumed_today = 0` and `last_fed_at = now` when `last_fed_at` is
/// NULL or not inside `today`.
///
/// # Returns
///
/// `true` if the row was reset, `false` if it was already current or the
/// animal does not exist (use [`animal_exists`] to tell those apart).
pub async fn reset_if_stale(
    tx: &mut Transaction<'_, Sqlite>,
    animal_id: AnimalId,
    now: DateTime<Utc>,
    today: DayBounds,
) -> StorageResult<bool> {
    let (day_start, day_end) = today;
    let result = sqlx::query(
        r#"
        UPDATE animals
        SET consumed_today = 0, last_fed_at = ?
        WHERE animal_id = ?
          AND (last_fed_at IS NULL OR last_fed_at < ? OR last_fed_at >= ?)
        "#,
    )
    .bind(to_unix(now))
    .bind(animal_id.as_i64())
    .bind(to_unix(day_start))
    .bind(to_unix(day_end))
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Check whether an animal is registered
pub async fn animal_exists(
    tx: &mut Transaction<'_, Sqlite>,
    animal_id: AnimalId,
) -> StorageResult<bool> {
    let result: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM animals WHERE animal_id = ?")
        .bind(animal_id.as_i64())
        .fetch_one(&mut **tx)
        .await?;

    Ok(result.0 > 0)
}

/// Read the quota state of an animal inside the transaction
///
/// Returns `None` if the animal is not registered.
pub async fn fetch_quota_state(
    tx: &mut Transaction<'_, Sqlite>,
    animal_id: AnimalId,
) -> StorageResult<Option<QuotaState>> {
    let animal = sqlx::query_as::<_, Animal>(
        r#"
        SELECT animal_id, daily_quota, consumed_today, last_fed_at
        FROM animals
        WHERE animal_id = ?
        "#,
    )
    .bind(animal_id.as_i64())
    .fetch_optional(&mut **tx)
    .await?;

    Ok(animal.map(|a| a.quota_state()))
}

/// Append a feeding event within a transaction
///
/// # Returns
///
/// Returns the auto-generated event ID on success
///
/// # Errors
///
/// Returns `StorageError::AnimalNotFound` if the animal is not registered.
pub async fn append_feeding_event(
    tx: &mut Transaction<'_, Sqlite>,
    event: &FeedingEvent,
) -> StorageResult<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO feeding_events (animal_id, fed_at, quantity)
        SELECT ?, ?, ?
        WHERE EXISTS (SELECT 1 FROM animals WHERE animal_id = ?)
        "#,
    )
    .bind(event.animal_id.as_i64())
    .bind(to_unix(event.fed_at))
    .bind(event.quantity)
    .bind(event.animal_id.as_i64())
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StorageError::not_found(event.animal_id));
    }

    Ok(result.last_insert_rowid())
}

/// Credit `quantity` to today's consumption and stamp `last_fed_at = now`
///
/// If the stored `last_fed_at` is not inside `today` the counter restarts at
/// `quantity`, so a feeding recorded just after midnight never inherits
/// yesterday's total.
///
/// # Errors
///
/// Returns `StorageError::AnimalNotFound` if no row was updated.
pub async fn apply_consumption(
    tx: &mut Transaction<'_, Sqlite>,
    animal_id: AnimalId,
    quantity: f64,
    now: DateTime<Utc>,
    today: DayBounds,
) -> StorageResult<()> {
    let (day_start, day_end) = today;
    let result = sqlx::query(
        r#"
        UPDATE animals
        SET consumed_today = CASE
                WHEN last_fed_at >= ? AND last_fed_at < ? THEN consumed_today + ?
                ELSE ?
            END,
            last_fed_at = ?
        WHERE animal_id = ?
        "#,
    )
    .bind(to_unix(day_start))
    .bind(to_unix(day_end))
    .bind(quantity)
    .bind(quantity)
    .bind(to_unix(now))
    .bind(animal_id.as_i64())
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StorageError::not_found(animal_id));
    }

    Ok(())
}
