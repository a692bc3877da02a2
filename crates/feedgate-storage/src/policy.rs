//! Daily-quota plus minimum-interval feeding policy.

use crate::error::{StorageError, StorageResult};
use crate::models::QuotaState;
use crate::repositories::ResetOutcome;
use chrono::{DateTime, TimeDelta, Utc};
use feedgate_core::constants::{DEFAULT_MIN_INTERVAL_SECS, DEFAULT_RATION_SIZE, QUANTITY_EPSILON};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ration size and cooldown applied by the authorizer
///
/// # Example
///
/// ```
/// use feedgate_storage::FeedingPolicy;
///
/// let policy = FeedingPolicy::new(2.0, 600);
/// assert!(policy.validate().is_ok());
/// assert_eq!(policy.min_interval().num_seconds(), 600);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedingPolicy {
    /// Quantity dispensed per eligible feeding
    pub ration_size: f64,

    /// Minimum seconds between two feedings of the same animal
    pub min_interval_secs: u64,
}

impl Default for FeedingPolicy {
    fn default() -> Self {
        Self {
            ration_size: DEFAULT_RATION_SIZE,
            min_interval_secs: DEFAULT_MIN_INTERVAL_SECS,
        }
    }
}

impl FeedingPolicy {
    pub fn new(ration_size: f64, min_interval_secs: u64) -> Self {
        Self {
            ration_size,
            min_interval_secs,
        }
    }

    /// # Errors
    ///
    /// Returns `StorageError::Validation` for a non-positive or non-finite
    /// ration, or a cooldown too large to represent.
    pub fn validate(&self) -> StorageResult<()> {
        validate_quantity("ration_size", self.ration_size)?;
        if self.checked_min_interval().is_none() {
            return Err(StorageError::Validation(format!(
                "min_interval_secs {} is out of range",
                self.min_interval_secs
            )));
        }
        Ok(())
    }

    pub fn min_interval(&self) -> TimeDelta {
        self.checked_min_interval().unwrap_or(TimeDelta::MAX)
    }

    fn checked_min_interval(&self) -> Option<TimeDelta> {
        i64::try_from(self.min_interval_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
    }

    /// Whether `daily_quota` is a whole number of rations
    pub fn divides_quota(&self, daily_quota: f64) -> bool {
        let rations = daily_quota / self.ration_size;
        (rations - rations.round()).abs() <= QUANTITY_EPSILON * rations.max(1.0)
    }

    /// Decide eligibility from a fresh quota state.
    ///
    /// The caller must have applied the daily reset first; `reset` tells
    /// whether that reset just happened. After a reset the timestamp was
    /// refreshed by the reset itself, so the cooldown is not checked.
    pub fn evaluate(
        &self,
        state: &QuotaState,
        reset: ResetOutcome,
        now: DateTime<Utc>,
    ) -> Eligibility {
        if !state.has_room_for(self.ration_size) {
            return Eligibility::QuotaExhausted {
                consumed_today: state.consumed_today,
                daily_quota: state.daily_quota,
            };
        }

        if reset.was_reset() {
            return Eligibility::Eligible;
        }

        match state.last_fed_at {
            Some(last) => {
                let elapsed = now - last;
                let interval = self.min_interval();
                if elapsed >= interval {
                    Eligibility::Eligible
                } else {
                    Eligibility::CooldownActive {
                        remaining: interval.checked_sub(&elapsed).unwrap_or(TimeDelta::MAX),
                    }
                }
            }
            None => Eligibility::Eligible,
        }
    }
}

/// Outcome of an eligibility check that completed without error
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Eligibility {
    Eligible,

    /// Fed too recently
    CooldownActive { remaining: TimeDelta },

    /// Another ration would exceed today's quota
    QuotaExhausted { consumed_today: f64, daily_quota: f64 },
}

impl Eligibility {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Self::Eligible)
    }
}

impl fmt::Display for Eligibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eligible => write!(f, "eligible"),
            Self::CooldownActive { remaining } => {
                write!(f, "cooldown active, {}s remaining", remaining.num_seconds())
            }
            Self::QuotaExhausted {
                consumed_today,
                daily_quota,
            } => write!(f, "quota exhausted ({consumed_today}/{daily_quota})"),
        }
    }
}

/// Reject quantities that are not finite and strictly positive.
pub(crate) fn validate_quantity(name: &str, value: f64) -> StorageResult<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(StorageError::Validation(format!(
            "{name} must be a positive number, got {value}"
        )));
    }
    Ok(())
}

/// Reject quotas that are not finite and non-negative.
pub(crate) fn validate_quota(value: f64) -> StorageResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(StorageError::Validation(format!(
            "daily_quota must be a non-negative number, got {value}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 6, 0, 0).unwrap()
    }

    fn state(consumed_today: f64, last_fed_secs_ago: Option<i64>) -> QuotaState {
        QuotaState {
            daily_quota: 4.0,
            consumed_today,
            last_fed_at: last_fed_secs_ago.map(|s| t0() - TimeDelta::seconds(s)),
        }
    }

    #[test]
    fn test_default_policy() {
        let policy = FeedingPolicy::default();
        assert_eq!(policy.ration_size, 1.0);
        assert_eq!(policy.min_interval(), TimeDelta::seconds(600));
        assert!(policy.validate().is_ok());
    }

    #[rstest]
    #[case(0.0)]
    #[case(-1.0)]
    #[case(f64::NAN)]
    #[case(f64::INFINITY)]
    fn test_invalid_ration_rejected(#[case] ration: f64) {
        let policy = FeedingPolicy::new(ration, 600);
        assert!(matches!(policy.validate(), Err(StorageError::Validation(_))));
    }

    #[test]
    fn test_oversized_interval_rejected() {
        assert!(FeedingPolicy::new(1.0, u64::MAX).validate().is_err());
    }

    #[rstest]
    #[case(0.0, None, ResetOutcome::WasReset, true)]
    #[case(2.0, Some(100), ResetOutcome::NoActionTaken, false)]
    #[case(2.0, Some(600), ResetOutcome::NoActionTaken, true)]
    #[case(2.0, Some(700), ResetOutcome::NoActionTaken, true)]
    #[case(4.0, Some(10_000), ResetOutcome::NoActionTaken, false)]
    #[case(0.0, Some(0), ResetOutcome::WasReset, true)] // reset skips cooldown
    #[case(0.0, None, ResetOutcome::NoActionTaken, true)]
    fn test_evaluate(
        #[case] consumed: f64,
        #[case] last_fed_secs_ago: Option<i64>,
        #[case] reset: ResetOutcome,
        #[case] eligible: bool,
    ) {
        let policy = FeedingPolicy::new(2.0, 600);
        let result = policy.evaluate(&state(consumed, last_fed_secs_ago), reset, t0());
        assert_eq!(result.is_eligible(), eligible, "{result}");
    }

    #[test]
    fn test_cooldown_reports_remaining() {
        let policy = FeedingPolicy::new(2.0, 600);
        let result = policy.evaluate(&state(2.0, Some(100)), ResetOutcome::NoActionTaken, t0());
        assert_eq!(
            result,
            Eligibility::CooldownActive {
                remaining: TimeDelta::seconds(500)
            }
        );
    }

    #[test]
    fn test_remaining_saturates_for_huge_interval() {
        let policy = FeedingPolicy::new(2.0, (i64::MAX / 1000) as u64);
        assert!(policy.validate().is_ok());

        // Last feeding stamped slightly ahead of now
        let result = policy.evaluate(&state(0.0, Some(-10)), ResetOutcome::NoActionTaken, t0());
        assert_eq!(
            result,
            Eligibility::CooldownActive {
                remaining: TimeDelta::MAX
            }
        );
    }

    #[test]
    fn test_quota_checked_before_cooldown() {
        let policy = FeedingPolicy::new(2.0, 600);
        let result = policy.evaluate(&state(4.0, Some(10)), ResetOutcome::NoActionTaken, t0());
        assert_eq!(
            result,
            Eligibility::QuotaExhausted {
                consumed_today: 4.0,
                daily_quota: 4.0
            }
        );
    }

    #[test]
    fn test_partial_ration_is_not_enough() {
        let policy = FeedingPolicy::new(2.0, 0);
        let mut s = state(2.0, Some(1000));
        s.daily_quota = 5.0;
        assert!(
            policy
                .evaluate(&s, ResetOutcome::NoActionTaken, t0())
                .is_eligible()
        );
        // 1.0 left, less than one ration
        s.consumed_today = 4.0;
        assert!(
            !policy
                .evaluate(&s, ResetOutcome::NoActionTaken, t0())
                .is_eligible()
        );
    }

    #[rstest]
    #[case(4.0, 2.0, true)]
    #[case(5.0, 2.0, false)]
    #[case(0.3, 0.1, true)]
    #[case(0.0, 1.0, true)]
    fn test_divides_quota(#[case] quota: f64, #[case] ration: f64, #[case] expected: bool) {
        assert_eq!(FeedingPolicy::new(ration, 600).divides_quota(quota), expected);
    }

    #[test]
    fn test_quota_validation() {
        assert!(validate_quota(0.0).is_ok());
        assert!(validate_quota(-0.5).is_err());
        assert!(validate_quota(f64::NAN).is_err());
    }
}
