use chrono::{DateTime, Utc};
use feedgate_core::{AnimalId, constants::QUANTITY_EPSILON};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Row, sqlite::SqliteRow};

use super::from_unix;

/// Animal registered at the feeder
///
/// # Fields
///
/// * `animal_id` - Key derived from the decoded ear tag
/// * `daily_quota` - Maximum quantity dispensed per local calendar day
/// * `consumed_today` - Quantity dispensed since the last day rollover
/// * `last_fed_at` - Last feeding (or rollover) instant; `None` if never fed
///
/// # Database Schema
///
/// Maps to the `animals` table. `last_fed_at` is stored as Unix seconds.
/// Rows are created by registration and never deleted by the feeder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Animal {
    pub animal_id: AnimalId,
    pub daily_quota: f64,
    pub consumed_today: f64,
    pub last_fed_at: Option<DateTime<Utc>>,
}

impl Animal {
    /// Snapshot of the fields the feeding policy looks at
    pub fn quota_state(&self) -> QuotaState {
        QuotaState {
            daily_quota: self.daily_quota,
            consumed_today: self.consumed_today,
            last_fed_at: self.last_fed_at,
        }
    }
}

impl<'r> FromRow<'r, SqliteRow> for Animal {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let animal_id: i64 = row.try_get("animal_id")?;
        let animal_id = AnimalId::new(animal_id).map_err(|e| sqlx::Error::ColumnDecode {
            index: "animal_id".to_string(),
            source: Box::new(e),
        })?;

        let last_fed_at = row
            .try_get::<Option<i64>, _>("last_fed_at")?
            .map(|secs| from_unix("last_fed_at", secs))
            .transpose()?;

        Ok(Self {
            animal_id,
            daily_quota: row.try_get("daily_quota")?,
            consumed_today: row.try_get("consumed_today")?,
            last_fed_at,
        })
    }
}

/// Quota and consumption state of one animal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuotaState {
    pub daily_quota: f64,
    pub consumed_today: f64,
    pub last_fed_at: Option<DateTime<Utc>>,
}

impl QuotaState {
    /// Quantity still available today (never negative)
    pub fn remaining(&self) -> f64 {
        (self.daily_quota - self.consumed_today).max(0.0)
    }

    /// Whether one more ration of `ration_size` fits in today's quota
    pub fn has_room_for(&self, ration_size: f64) -> bool {
        self.consumed_today + ration_size <= self.daily_quota + QUANTITY_EPSILON
    }
}
