use crate::error::{StorageError, StorageResult};
use sqlx::ConnectOptions;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::future::Future;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Database connection configuration for SQLite
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    pub database_path: String,

    /// Maximum number of connections in the pool
    ///
    /// Defaults to one: the feeder runs a single logical flow and every
    /// operation is serialised on the same connection.
    pub max_connections: u32,

    /// Timeout for acquiring a connection from the pool
    pub acquire_timeout: Duration,

    /// How long SQLite waits on a locked database before failing
    pub busy_timeout: Duration,

    /// Deadline for one complete store operation (all statements included)
    pub operation_timeout: Duration,

    /// Whether to create the database file if it doesn't exist
    pub create_if_missing: bool,

    /// Whether to run migrations on connection
    pub auto_migrate: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_path: "feedgate.db".to_string(),
            max_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_secs(2),
            operation_timeout: Duration::from_secs(5),
            create_if_missing: true,
            auto_migrate: true,
        }
    }
}

impl DatabaseConfig {
    /// Create a new database configuration with the given path
    pub fn new(database_path: impl Into<String>) -> Self {
        Self {
            database_path: database_path.into(),
            ..Default::default()
        }
    }

    /// Set the maximum number of connections in the pool
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the deadline for a single store operation
    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Set how long SQLite waits on locks
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Set whether to create the database if it doesn't exist
    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    /// Set whether to run migrations automatically
    pub fn auto_migrate(mut self, migrate: bool) -> Self {
        self.auto_migrate = migrate;
        self
    }
}

/// Owned handle to the feeder database.
///
/// Opened once at startup and passed to the repositories and the authorizer.
/// Clones share the same pool; the connection is released when the last
/// clone is dropped or [`Database::close`] is called, on every exit path.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    operation_timeout: Duration,
}

impl Database {
    /// Open the database described by `config`
    ///
    /// # Example
    ///
    /// ```no_run
    /// use feedgate_storage::connection::{Database, DatabaseConfig};
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let config = DatabaseConfig::new("/var/lib/feedgate/feedgate.db").auto_migrate(true);
    /// let db = Database::new(config).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn new(config: DatabaseConfig) -> StorageResult<Self> {
        if config.max_connections == 0 {
            return Err(StorageError::Configuration(
                "max_connections must be at least 1".to_string(),
            ));
        }

        // Create parent directory if it doesn't exist
        if let Some(parent) = Path::new(&config.database_path).parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::Configuration(format!("Failed to create database directory: {}", e))
            })?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", config.database_path))
            .map_err(|e| StorageError::Configuration(format!("Invalid database path: {}", e)))?
            .create_if_missing(config.create_if_missing)
            .foreign_keys(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Full) // Power loss must not lose a dispensation
            .busy_timeout(config.busy_timeout)
            .disable_statement_logging();

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_with(options)
            .await?;

        info!(path = %config.database_path, "Opened feeder database");

        let db = Self {
            pool,
            operation_timeout: config.operation_timeout,
        };

        if config.auto_migrate {
            db.migrate().await?;
        }

        Ok(db)
    }

    /// Create an in-memory database (primarily for testing)
    pub async fn in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        // The schema lives in the one connection; never let the pool recycle it.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let db = Self {
            pool,
            operation_timeout: DatabaseConfig::default().operation_timeout,
        };
        db.migrate().await?;

        Ok(db)
    }

    /// Run database migrations
    ///
    /// Migrations are embedded at compile time by `sqlx::migrate!` from the
    /// workspace `migrations/` directory.
    pub async fn migrate(&self) -> StorageResult<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        debug!("Database migrations applied");
        Ok(())
    }

    /// Get a reference to the underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Deadline applied to each store operation
    pub fn operation_timeout(&self) -> Duration {
        self.operation_timeout
    }

    /// Run `operation` under the configured deadline.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Timeout` if the future does not complete in time,
    /// otherwise whatever the operation returned.
    pub async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> StorageResult<T>
    where
        F: Future<Output = StorageResult<T>>,
    {
        match tokio::time::timeout(self.operation_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    operation,
                    timeout_ms = self.operation_timeout.as_millis() as u64,
                    "Store operation timed out"
                );
                Err(StorageError::Timeout {
                    operation,
                    timeout_ms: self.operation_timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Close the database connection pool
    ///
    /// Waits for the active connection to be returned before closing it.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Closed feeder database");
    }

    /// Check if the database connection is healthy
    pub async fn health_check(&self) -> StorageResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_config_defaults() {
        let config = DatabaseConfig::default();

        assert_eq!(config.database_path, "feedgate.db");
        assert_eq!(config.max_connections, 1);
        assert_eq!(config.acquire_timeout, Duration::from_secs(5));
        assert_eq!(config.operation_timeout, Duration::from_secs(5));
        assert!(config.create_if_missing);
        assert!(config.auto_migrate);
    }

    #[test]
    fn test_database_config_builder() {
        let config = DatabaseConfig::new("test.db")
            .max_connections(2)
            .operation_timeout(Duration::from_millis(250))
            .busy_timeout(Duration::from_millis(100))
            .create_if_missing(false)
            .auto_migrate(false);

        assert_eq!(config.database_path, "test.db");
        assert_eq!(config.max_connections, 2);
        assert_eq!(config.operation_timeout, Duration::from_millis(250));
        assert_eq!(config.busy_timeout, Duration::from_millis(100));
        assert!(!config.create_if_missing);
        assert!(!config.auto_migrate);
    }

    #[tokio::test]
    async fn test_zero_connections_rejected() {
        let result = Database::new(DatabaseConfig::new("unused.db").max_connections(0)).await;
        assert!(matches!(result, Err(StorageError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_bounded_times_out() {
        let db = Database::in_memory().await.unwrap();
        let db = Database {
            operation_timeout: Duration::from_millis(10),
            ..db
        };

        let result: StorageResult<()> = db
            .bounded("sleep", async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;

        assert!(matches!(
            result,
            Err(StorageError::Timeout {
                operation: "sleep",
                ..
            })
        ));
    }
}
