use crate::connection::Database;
use crate::error::{StorageError, StorageResult};
use crate::models::{FeedingEvent, QuotaState};
use crate::policy::{Eligibility, FeedingPolicy, validate_quantity, validate_quota};
use crate::repositories::{
    AnimalRepository, FeedingLogRepository, ResetOutcome, SqliteAnimalRepository,
    SqliteFeedingLogRepository,
};
use crate::transaction;
use chrono::{DateTime, NaiveDate, Utc};
use feedgate_core::{AnimalId, Clock, SystemClock};
use tracing::{debug, info, warn};

/// Feeding authorization engine
///
/// Decides whether an animal may receive a ration and books dispensations.
/// Holds no cached state: every decision reads the store, so restarts never
/// produce stale answers.
///
/// # Authorization Flow
///
/// 1. **Clock**: read `now`; a `ClockError` aborts the decision
/// 2. **Daily reset**: zero `consumed_today` if the last feeding was on
///    another local day (same transaction as step 3)
/// 3. **Quota state**: read the fresh record, `AnimalNotFound` if missing
/// 4. **Policy**: quota room for one ration, then cooldown unless step 2
///    just reset the record
///
/// Errors are never folded into "not eligible": callers get
/// `Ok(Eligibility)` or `Err(StorageError)`.
///
/// # Examples
///
/// ```no_run
/// use feedgate_core::{AnimalId, SystemClock};
/// use feedgate_storage::{Database, DatabaseConfig, FeedingAuthorizer, FeedingPolicy};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let db = Database::new(DatabaseConfig::new("feedgate.db")).await?;
/// let authorizer = FeedingAuthorizer::new(db, SystemClock::new(), FeedingPolicy::default())?;
///
/// let animal = AnimalId::new(42)?;
/// authorizer.register_animal(animal, 4.0).await?;
///
/// if authorizer.is_eligible(animal).await? {
///     // dispense, then book it
///     authorizer.record_ration(animal).await?;
/// }
/// # Ok(())
/// # }
/// ```
pub struct FeedingAuthorizer<C: Clock = SystemClock> {
    db: Database,
    animals: SqliteAnimalRepository,
    log: SqliteFeedingLogRepository,
    clock: C,
    policy: FeedingPolicy,
}

impl<C: Clock> FeedingAuthorizer<C> {
    /// Create an authorizer over an open database
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Validation` if the policy is invalid.
    pub fn new(db: Database, clock: C, policy: FeedingPolicy) -> StorageResult<Self> {
        policy.validate()?;

        Ok(Self {
            animals: SqliteAnimalRepository::new(db.pool().clone()),
            log: SqliteFeedingLogRepository::new(db.pool().clone()),
            db,
            clock,
            policy,
        })
    }

    pub fn policy(&self) -> &FeedingPolicy {
        &self.policy
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Run the authorization flow and report why an animal is or is not
    /// eligible.
    ///
    /// # Errors
    ///
    /// - `StorageError::Clock` if the time source is unavailable
    /// - `StorageError::AnimalNotFound` for unregistered animals
    /// - `StorageError::Database` / `StorageError::Timeout` on store failures
    pub async fn check_eligibility(&self, animal_id: AnimalId) -> StorageResult<Eligibility> {
        let now = self.clock.now()?;
        let today = self.clock.day_bounds_at(now)?;

        let (reset, state) = self
            .db
            .bounded("check_eligibility", async {
                let mut tx = self.db.pool().begin().await?;

                let reset = if transaction::reset_if_stale(&mut tx, animal_id, now, today).await? {
                    ResetOutcome::WasReset
                } else {
                    ResetOutcome::NoActionTaken
                };

                let state = transaction::fetch_quota_state(&mut tx, animal_id)
                    .await?
                    .ok_or(StorageError::not_found(animal_id))?;

                tx.commit().await?;
                Ok((reset, state))
            })
            .await?;

        let eligibility = self.policy.evaluate(&state, reset, now);
        debug!(
            animal_id = %animal_id,
            reset = reset.was_reset(),
            consumed_today = state.consumed_today,
            daily_quota = state.daily_quota,
            %eligibility,
            "Eligibility evaluated"
        );

        Ok(eligibility)
    }

    /// Boolean form of [`check_eligibility`](Self::check_eligibility)
    pub async fn is_eligible(&self, animal_id: AnimalId) -> StorageResult<bool> {
        Ok(self.check_eligibility(animal_id).await?.is_eligible())
    }

    /// Book a dispensation of `quantity` at `now`
    ///
    /// Appends the feeding event and credits the quota counter in one
    /// transaction. On any failure the transaction is rolled back, so the log
    /// and the counter never disagree.
    ///
    /// # Returns
    ///
    /// The ID of the new feeding event
    pub async fn record_feeding(
        &self,
        animal_id: AnimalId,
        quantity: f64,
        now: DateTime<Utc>,
    ) -> StorageResult<i64> {
        validate_quantity("quantity", quantity)?;
        let today = self.clock.day_bounds_at(now)?;
        let event = FeedingEvent::new(animal_id, now, quantity);

        let event_id = self
            .db
            .bounded("record_feeding", async {
                let mut tx = self.db.pool().begin().await?;

                let result = async {
                    let event_id = transaction::append_feeding_event(&mut tx, &event).await?;
                    transaction::apply_consumption(&mut tx, animal_id, quantity, now, today)
                        .await?;
                    Ok::<_, StorageError>(event_id)
                }
                .await;

                match result {
                    Ok(event_id) => {
                        tx.commit().await?;
                        Ok(event_id)
                    }
                    Err(e) => {
                        if let Err(rollback_err) = tx.rollback().await {
                            warn!(animal_id = %animal_id, error = %rollback_err, "Rollback failed");
                        }
                        Err(e)
                    }
                }
            })
            .await?;

        info!(animal_id = %animal_id, quantity, event_id, "Feeding recorded");
        Ok(event_id)
    }

    /// Book one policy ration at the clock's current time
    pub async fn record_ration(&self, animal_id: AnimalId) -> StorageResult<i64> {
        let now = self.clock.now()?;
        self.record_feeding(animal_id, self.policy.ration_size, now)
            .await
    }

    /// Register an animal
    ///
    /// A quota that is not a whole number of rations is accepted, but the
    /// last partial ration will never be dispensed.
    pub async fn register_animal(&self, animal_id: AnimalId, daily_quota: f64) -> StorageResult<()> {
        validate_quota(daily_quota)?;
        self.warn_on_partial_ration(animal_id, daily_quota);

        self.db
            .bounded("register_animal", self.animals.register(animal_id, daily_quota))
            .await?;

        info!(animal_id = %animal_id, daily_quota, "Animal registered");
        Ok(())
    }

    pub async fn set_daily_quota(&self, animal_id: AnimalId, daily_quota: f64) -> StorageResult<()> {
        validate_quota(daily_quota)?;
        self.warn_on_partial_ration(animal_id, daily_quota);

        self.db
            .bounded(
                "set_daily_quota",
                self.animals.set_daily_quota(animal_id, daily_quota),
            )
            .await?;

        info!(animal_id = %animal_id, daily_quota, "Daily quota updated");
        Ok(())
    }

    /// Total quantity fed on a local calendar date
    ///
    /// Returns 0.0 for dates without feedings and for unknown animals.
    pub async fn consumed_on_date(&self, animal_id: AnimalId, date: NaiveDate) -> StorageResult<f64> {
        let (start, end) = self.clock.day_bounds(date)?;
        self.db
            .bounded(
                "consumed_on_date",
                self.log.sum_in_range(animal_id, start, end),
            )
            .await
    }

    /// Stored quota state, without applying the daily reset
    pub async fn quota_state(&self, animal_id: AnimalId) -> StorageResult<QuotaState> {
        self.db
            .bounded("quota_state", self.animals.quota_state(animal_id))
            .await
    }

    /// Most recent feedings of an animal, newest first
    pub async fn history(&self, animal_id: AnimalId, limit: i64) -> StorageResult<Vec<FeedingEvent>> {
        self.db
            .bounded("history", self.log.find_by_animal(animal_id, limit))
            .await
    }

    fn warn_on_partial_ration(&self, animal_id: AnimalId, daily_quota: f64) {
        if !self.policy.divides_quota(daily_quota) {
            warn!(
                animal_id = %animal_id,
                daily_quota,
                ration_size = self.policy.ration_size,
                "Daily quota is not a whole number of rations"
            );
        }
    }
}
