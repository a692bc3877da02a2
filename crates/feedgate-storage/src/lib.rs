//! Storage layer and feeding authorization for the feedgate livestock feeder.
//!
//! This crate provides SQLite-backed persistence for registered animals and
//! the append-only feeding log, plus the authorizer that decides whether an
//! animal identified by its ear tag may receive a ration.
//!
//! # Architecture
//!
//! - [`Database`] - Owned connection handle with embedded migrations and a
//!   per-operation deadline
//! - [`AnimalRepository`], [`FeedingLogRepository`] - Data access traits
//! - [`transaction`] - Statements that run inside a caller's transaction
//! - [`FeedingPolicy`] - Ration size and cooldown, evaluated against a
//!   fresh [`QuotaState`]
//! - [`FeedingAuthorizer`] - Day rollover, eligibility and atomic booking
//!
//! # Core Concepts
//!
//! ## Lazy Day Rollover
//!
//! There is no midnight timer. The first eligibility check of a new local
//! day zeroes `consumed_today` and stamps `last_fed_at`; that check skips
//! the cooldown because the animal has not been fed yet today.
//!
//! ## Three-Way Outcome
//!
//! An eligibility check yields `Ok(Eligibility::Eligible)`, `Ok` with a
//! denial reason, or `Err(StorageError)`. A store or clock failure is never
//! reported as a denial.
//!
//! # Examples
//!
//! ```no_run
//! use chrono::NaiveDate;
//! use feedgate_core::{AnimalId, SystemClock};
//! use feedgate_storage::{Database, DatabaseConfig, FeedingAuthorizer, FeedingPolicy};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new(DatabaseConfig::new("feedgate.db")).await?;
//! let policy = FeedingPolicy::new(2.0, 600);
//! let authorizer = FeedingAuthorizer::new(db, SystemClock::new(), policy)?;
//!
//! let animal = AnimalId::new(42)?;
//! match authorizer.check_eligibility(animal).await? {
//!     eligibility if eligibility.is_eligible() => {
//!         authorizer.record_ration(animal).await?;
//!     }
//!     denied => println!("Animal {animal}: {denied}"),
//! }
//!
//! let date = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
//! println!("Fed on {date}: {}", authorizer.consumed_on_date(animal, date).await?);
//! # Ok(())
//! # }
//! ```

pub mod authorizer;
pub mod connection;
pub mod error;
pub mod models;
pub mod policy;
pub mod repositories;
pub mod transaction;

pub use authorizer::FeedingAuthorizer;
pub use connection::{Database, DatabaseConfig};
pub use error::{StorageError, StorageResult};
pub use models::{Animal, FeedingEvent, QuotaState};
pub use policy::{Eligibility, FeedingPolicy};
pub use repositories::{
    AnimalRepository, FeedingLogRepository, ResetOutcome, SqliteAnimalRepository,
    SqliteFeedingLogRepository,
};
