use feedgate_core::{AnimalId, ClockError};
use thiserror::Error;

/// Storage-specific error types for the feeder.
///
/// Every failure is surfaced to the caller; none is folded into a
/// "not eligible" answer, so an operator can tell a denied animal from a
/// malfunctioning store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database connection or query execution failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration execution failed
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Operation referenced an animal that was never registered
    #[error("Animal not found: {animal_id}")]
    AnimalNotFound { animal_id: AnimalId },

    /// Registration conflict
    #[error("Animal already registered: {animal_id}")]
    DuplicateAnimal { animal_id: AnimalId },

    /// Data validation failed
    #[error("Validation error: {0}")]
    Validation(String),

    /// Time source could not be trusted
    #[error("Clock error: {0}")]
    Clock(#[from] ClockError),

    /// Operation exceeded its deadline
    #[error("Operation '{operation}' timed out after {timeout_ms}ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl StorageError {
    /// Build an `AnimalNotFound` error.
    pub fn not_found(animal_id: AnimalId) -> Self {
        Self::AnimalNotFound { animal_id }
    }

    /// Whether this error means the animal is simply not registered.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::AnimalNotFound { .. })
    }
}

/// Specialized result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
