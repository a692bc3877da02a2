//! Time source and calendar-day arithmetic.
//!
//! Quota resets are driven by day boundaries, so every component that needs
//! "now" receives a [`Clock`] instead of reading the wall clock directly.
//! Day boundaries are computed in a fixed UTC offset (UTC by default); fixed
//! offsets have no DST gaps, so every local day is exactly 24 hours long.

use crate::constants::{DEFAULT_CLOCK_SYNC_FLOOR_SECS, SECONDS_PER_DAY};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Offset, TimeDelta, Utc};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Failures of the time source.
///
/// No authorization decision may proceed without a trustworthy timestamp.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClockError {
    #[error("System time is before the Unix epoch")]
    BeforeEpoch,

    #[error("System time {now} is before the synchronisation floor {floor}")]
    Unsynchronized {
        now: DateTime<Utc>,
        floor: DateTime<Utc>,
    },

    #[error("Timestamp out of range")]
    OutOfRange,

    #[error("Invalid UTC offset: {seconds}s")]
    InvalidOffset { seconds: i32 },

    #[error("Time source unavailable: {0}")]
    Unavailable(String),
}

/// Source of the current instant plus the calendar used for day boundaries.
pub trait Clock: Send + Sync {
    /// Current instant.
    ///
    /// # Errors
    /// Returns `ClockError` when the time source cannot be trusted.
    fn now(&self) -> Result<DateTime<Utc>, ClockError>;

    /// Offset of the local calendar from UTC.
    fn offset(&self) -> FixedOffset {
        Utc.fix()
    }

    /// Local calendar date containing `instant`.
    ///
    /// # Errors
    /// Returns `ClockError::OutOfRange` when the local time is not
    /// representable.
    fn local_date(&self, instant: DateTime<Utc>) -> Result<NaiveDate, ClockError> {
        let offset = TimeDelta::seconds(i64::from(self.offset().local_minus_utc()));
        instant
            .naive_utc()
            .checked_add_signed(offset)
            .map(|local| local.date())
            .ok_or(ClockError::OutOfRange)
    }

    /// Start of the local day for `date`, expressed in UTC.
    ///
    /// # Errors
    /// Returns `ClockError::OutOfRange` at the edges of the calendar.
    fn start_of_date(&self, date: NaiveDate) -> Result<DateTime<Utc>, ClockError> {
        let offset = TimeDelta::seconds(i64::from(self.offset().local_minus_utc()));
        date.and_time(NaiveTime::MIN)
            .and_utc()
            .checked_sub_signed(offset)
            .ok_or(ClockError::OutOfRange)
    }

    /// Midnight of the local day containing `instant`.
    fn start_of_day(&self, instant: DateTime<Utc>) -> Result<DateTime<Utc>, ClockError> {
        self.start_of_date(self.local_date(instant)?)
    }

    /// Half-open `[start, end)` range covering the local day `date`.
    fn day_bounds(&self, date: NaiveDate) -> Result<(DateTime<Utc>, DateTime<Utc>), ClockError> {
        let start = self.start_of_date(date)?;
        let end = start
            .checked_add_signed(TimeDelta::seconds(SECONDS_PER_DAY))
            .ok_or(ClockError::OutOfRange)?;
        Ok((start, end))
    }

    /// Bounds of the local day containing `instant`.
    fn day_bounds_at(
        &self,
        instant: DateTime<Utc>,
    ) -> Result<(DateTime<Utc>, DateTime<Utc>), ClockError> {
        self.day_bounds(self.local_date(instant)?)
    }

    /// Whether both instants fall on the same local calendar day.
    fn same_day(&self, a: DateTime<Utc>, b: DateTime<Utc>) -> Result<bool, ClockError> {
        Ok(self.local_date(a)? == self.local_date(b)?)
    }
}

/// Wall clock backed by [`SystemTime`].
///
/// Instants earlier than the synchronisation floor are refused: a controller
/// that booted without network time reports 1970 and would otherwise reset
/// every animal's quota on each read.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: FixedOffset,
    sync_floor: DateTime<Utc>,
}

impl SystemClock {
    /// UTC calendar with the default synchronisation floor.
    pub fn new() -> Self {
        Self {
            offset: Utc.fix(),
            sync_floor: DateTime::from_timestamp(DEFAULT_CLOCK_SYNC_FLOOR_SECS, 0)
                .unwrap_or(DateTime::UNIX_EPOCH),
        }
    }

    /// Use a fixed local offset (seconds east of UTC) for day boundaries.
    ///
    /// # Errors
    /// Returns `ClockError::InvalidOffset` outside ±24h.
    pub fn with_utc_offset(mut self, seconds: i32) -> Result<Self, ClockError> {
        self.offset = FixedOffset::east_opt(seconds).ok_or(ClockError::InvalidOffset { seconds })?;
        Ok(self)
    }

    /// Override the earliest instant accepted as synchronised.
    pub fn with_sync_floor(mut self, floor: DateTime<Utc>) -> Self {
        self.sync_floor = floor;
        self
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Result<DateTime<Utc>, ClockError> {
        let elapsed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| ClockError::BeforeEpoch)?;
        let secs = i64::try_from(elapsed.as_secs()).map_err(|_| ClockError::OutOfRange)?;
        // Whole seconds, the resolution timestamps are stored with
        let now = DateTime::from_timestamp(secs, 0).ok_or(ClockError::OutOfRange)?;

        if now < self.sync_floor {
            return Err(ClockError::Unsynchronized {
                now,
                floor: self.sync_floor,
            });
        }
        Ok(now)
    }

    fn offset(&self) -> FixedOffset {
        self.offset
    }
}

#[derive(Debug)]
struct ManualState {
    now: DateTime<Utc>,
    unavailable: bool,
}

/// Manually driven clock for tests and replay tools.
///
/// Clones share the same underlying instant, so a test can keep one handle
/// and advance time seen by the component holding the other.
#[derive(Debug, Clone)]
pub struct ManualClock {
    state: Arc<Mutex<ManualState>>,
    offset: FixedOffset,
}

impl ManualClock {
    /// Clock frozen at `now`, UTC calendar.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            state: Arc::new(Mutex::new(ManualState {
                now,
                unavailable: false,
            })),
            offset: Utc.fix(),
        }
    }

    /// Same clock with a different calendar offset.
    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Jump to an absolute instant.
    pub fn set(&self, now: DateTime<Utc>) {
        self.lock().now = now;
    }

    /// Move time forward (or backward for negative deltas).
    pub fn advance(&self, delta: TimeDelta) {
        let mut state = self.lock();
        state.now += delta;
    }

    /// Make subsequent [`Clock::now`] calls fail with `ClockError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Result<DateTime<Utc>, ClockError> {
        let state = self.lock();
        if state.unavailable {
            return Err(ClockError::Unavailable("manual clock disabled".to_string()));
        }
        Ok(state.now)
    }

    fn offset(&self) -> FixedOffset {
        self.offset
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Result<DateTime<Utc>, ClockError> {
        (**self).now()
    }

    fn offset(&self) -> FixedOffset {
        (**self).offset()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    #[test]
    fn test_start_of_day_utc() {
        let clock = ManualClock::new(utc(2025, 3, 10, 6, 0, 0));
        assert_eq!(
            clock.start_of_day(utc(2025, 3, 10, 23, 59, 59)).unwrap(),
            utc(2025, 3, 10, 0, 0, 0)
        );
    }

    #[test]
    fn test_midnight_is_start_of_its_own_day() {
        let clock = ManualClock::new(utc(2025, 3, 10, 0, 0, 0));
        let midnight = utc(2025, 3, 11, 0, 0, 0);
        assert_eq!(clock.start_of_day(midnight).unwrap(), midnight);
        assert!(!clock.same_day(midnight - TimeDelta::seconds(1), midnight).unwrap());
        assert!(clock.same_day(midnight, midnight + TimeDelta::seconds(86_399)).unwrap());
    }

    #[rstest]
    #[case(utc(2025, 3, 10, 0, 0, 0), utc(2025, 3, 10, 23, 59, 59), true)]
    #[case(utc(2025, 3, 10, 23, 59, 59), utc(2025, 3, 11, 0, 0, 0), false)]
    #[case(utc(2025, 3, 10, 12, 0, 0), utc(2025, 3, 9, 12, 0, 0), false)]
    #[case(utc(2024, 12, 31, 23, 0, 0), utc(2025, 1, 1, 1, 0, 0), false)]
    fn test_same_day_utc(
        #[case] a: DateTime<Utc>,
        #[case] b: DateTime<Utc>,
        #[case] expected: bool,
    ) {
        let clock = ManualClock::new(a);
        assert_eq!(clock.same_day(a, b).unwrap(), expected);
    }

    #[test]
    fn test_day_boundaries_with_negative_offset() {
        // UTC-3: local midnight is 03:00Z
        let offset = FixedOffset::west_opt(3 * 3600).unwrap();
        let clock = ManualClock::new(utc(2025, 3, 10, 12, 0, 0)).with_offset(offset);

        assert_eq!(
            clock.start_of_day(utc(2025, 3, 10, 2, 0, 0)).unwrap(),
            utc(2025, 3, 9, 3, 0, 0)
        );
        assert!(
            !clock
                .same_day(utc(2025, 3, 10, 2, 59, 59), utc(2025, 3, 10, 3, 0, 0))
                .unwrap()
        );

        let date = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let (start, end) = clock.day_bounds(date).unwrap();
        assert_eq!(start, utc(2025, 3, 10, 3, 0, 0));
        assert_eq!(end, utc(2025, 3, 11, 3, 0, 0));
    }

    #[test]
    fn test_calendar_edges_are_errors() {
        let utc_clock = ManualClock::new(utc(2025, 3, 10, 0, 0, 0));
        let east = ManualClock::new(utc(2025, 3, 10, 0, 0, 0))
            .with_offset(FixedOffset::east_opt(3 * 3600).unwrap());
        let west = ManualClock::new(utc(2025, 3, 10, 0, 0, 0))
            .with_offset(FixedOffset::west_opt(3 * 3600).unwrap());

        assert_eq!(utc_clock.day_bounds(NaiveDate::MAX), Err(ClockError::OutOfRange));
        assert_eq!(east.start_of_date(NaiveDate::MIN), Err(ClockError::OutOfRange));
        assert_eq!(west.day_bounds(NaiveDate::MAX), Err(ClockError::OutOfRange));

        assert_eq!(east.local_date(DateTime::<Utc>::MAX_UTC), Err(ClockError::OutOfRange));
        assert_eq!(west.local_date(DateTime::<Utc>::MIN_UTC), Err(ClockError::OutOfRange));
        assert_eq!(east.day_bounds_at(DateTime::<Utc>::MAX_UTC), Err(ClockError::OutOfRange));
    }

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::new(utc(2025, 3, 10, 6, 0, 0));
        let other = clock.clone();

        clock.advance(TimeDelta::seconds(700));
        assert_eq!(other.now().unwrap(), utc(2025, 3, 10, 6, 11, 40));

        other.set_unavailable(true);
        assert!(matches!(clock.now(), Err(ClockError::Unavailable(_))));
    }

    #[test]
    fn test_system_clock_sync_floor() {
        let clock = SystemClock::new();
        assert!(clock.now().is_ok());

        let far_future = utc(9999, 1, 1, 0, 0, 0);
        let clock = SystemClock::new().with_sync_floor(far_future);
        assert!(matches!(
            clock.now(),
            Err(ClockError::Unsynchronized { .. })
        ));
    }

    #[test]
    fn test_system_clock_offset_validation() {
        assert!(SystemClock::new().with_utc_offset(-3 * 3600).is_ok());
        assert_eq!(
            SystemClock::new().with_utc_offset(90_000).unwrap_err(),
            ClockError::InvalidOffset { seconds: 90_000 }
        );
    }
}
