pub mod animal;
pub mod feeding_event;

pub use animal::{Animal, QuotaState};
pub use feeding_event::FeedingEvent;

use chrono::{DateTime, Utc};

/// Timestamps are stored as Unix seconds.
pub(crate) fn to_unix(instant: DateTime<Utc>) -> i64 {
    instant.timestamp()
}

pub(crate) fn from_unix(column: &str, secs: i64) -> Result<DateTime<Utc>, sqlx::Error> {
    DateTime::from_timestamp(secs, 0).ok_or_else(|| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: format!("timestamp {secs} out of range").into(),
    })
}
