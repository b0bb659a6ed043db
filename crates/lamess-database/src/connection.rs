//! SQLite connection pool management.

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::info;

use lamess_core::config::StorageConfig;
use lamess_core::error::{AppError, ErrorKind};

const DB_FILE_NAME: &str = "lamess.db";

/// Wrapper around the sqlx SQLite connection pool.
#[derive(Debug, Clone)]
pub struct DatabasePool {
    /// The underlying sqlx connection pool.
    pool: SqlitePool,
}

impl DatabasePool {
    /// Open (creating if missing) the database file under the configured
    /// storage location.
    pub async fn connect(config: &StorageConfig) -> Result<Self, AppError> {
        let location = config.ensure_location()?;
        let db_path = location.join(DB_FILE_NAME);

        info!(path = %db_path.display(), "Opening SQLite database");

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Database,
                    format!("Failed to open database {}: {e}", db_path.display()),
                    e,
                )
            })?;

        Ok(Self { pool })
    }

    /// Open an in-memory database, used by tests.
    ///
    /// Capped at a single connection; every pooled connection would
    /// otherwise see its own empty in-memory database.
    pub async fn connect_in_memory() -> Result<Self, AppError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Bad memory DSN", e))?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to open in-memory database", e)
            })?;
        Ok(Self { pool })
    }

    /// Return a reference to the underlying sqlx pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Check database connectivity.
    pub async fn health_check(&self) -> Result<bool, AppError> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|v| v == 1)
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Health check failed", e))
    }

    /// Close all connections in the pool.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database pool closed");
    }
}
