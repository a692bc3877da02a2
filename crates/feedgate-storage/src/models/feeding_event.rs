use chrono::{DateTime, Utc};
use feedgate_core::AnimalId;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Row, sqlite::SqliteRow};

use super::from_unix;

/// One dispensed ration
///
/// Rows in `feeding_events` are append-only: created exactly once per
/// successful dispensation and never updated (a trigger rejects updates).
/// They are the audit trail and the source for historical totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedingEvent {
    /// Auto-increment primary key (0 before insertion)
    pub id: i64,
    pub animal_id: AnimalId,
    pub fed_at: DateTime<Utc>,
    pub quantity: f64,
}

impl FeedingEvent {
    /// Create an event that has not been persisted yet
    pub fn new(animal_id: AnimalId, fed_at: DateTime<Utc>, quantity: f64) -> Self {
        Self {
            id: 0,
            animal_id,
            fed_at,
            quantity,
        }
    }
}

impl<'r> FromRow<'r, SqliteRow> for FeedingEvent {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let animal_id: i64 = row.try_get("animal_id")?;
        let animal_id = AnimalId::new(animal_id).map_err(|e| sqlx::Error::ColumnDecode {
            index: "animal_id".to_string(),
            source: Box::new(e),
        })?;

        Ok(Self {
            id: row.try_get("id")?,
            animal_id,
            fed_at: from_unix("fed_at", row.try_get("fed_at")?)?,
            quantity: row.try_get("quantity")?,
        })
    }
}
