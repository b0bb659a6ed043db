//! Schema migrations.

use sqlx::SqlitePool;
use tracing::info;

use lamess_core::error::{AppError, ErrorKind};

const CREATE_USERS: &str = "\
CREATE TABLE IF NOT EXISTS users (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    username     TEXT NOT NULL UNIQUE,
    display_name TEXT NOT NULL,
    email        TEXT NOT NULL
)";

const CREATE_SESSIONS: &str = "\
CREATE TABLE IF NOT EXISTS sessions (
    id                      INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id                 INTEGER NOT NULL REFERENCES users(id),
    session_id              TEXT NOT NULL UNIQUE,
    device_preference_index INTEGER NOT NULL,
    expiry_time             TEXT NOT NULL,
    reply_to                TEXT NOT NULL
)";

/// Create the schema if it does not exist yet.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), AppError> {
    for statement in [CREATE_USERS, CREATE_SESSIONS] {
        sqlx::query(statement).execute(pool).await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to run migration", e)
        })?;
    }
    info!("Database schema up to date");
    Ok(())
}
