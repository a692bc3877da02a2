pub mod animal;
pub mod feeding_log;

pub use animal::{AnimalRepository, ResetOutcome, SqliteAnimalRepository};
pub use feeding_log::{FeedingLogRepository, SqliteFeedingLogRepository};
