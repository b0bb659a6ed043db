//! Session repository implementation.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use lamess_core::error::{AppError, ErrorKind};
use lamess_core::result::AppResult;
use lamess_entity::session::{CreateSessionRow, SessionRow};

/// Repository for session rows.
#[derive(Debug, Clone)]
pub struct SessionRepository {
    pool: SqlitePool,
}

impl SessionRepository {
    /// Create a new session repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new session row.
    ///
    /// A uniqueness conflict on `session_id` is reported as
    /// [`ErrorKind::SaveFailed`] so callers can tell it apart from other
    /// database failures.
    pub async fn insert(&self, data: &CreateSessionRow) -> AppResult<SessionRow> {
        sqlx::query_as::<_, SessionRow>(
            "INSERT INTO sessions \
               (user_id, session_id, device_preference_index, expiry_time, reply_to) \
             VALUES ($1, $2, $3, $4, $5) RETURNING *",
        )
        .bind(data.user_id)
        .bind(&data.session_id)
        .bind(data.device_preference_index)
        .bind(data.expiry_time)
        .bind(&data.reply_to)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::with_source(
                    ErrorKind::SaveFailed,
                    format!("Session {} already exists", data.session_id),
                    e,
                )
            }
            _ => AppError::with_source(ErrorKind::Database, "Failed to insert session", e),
        })
    }

    /// Move a session's expiry to a new absolute instant. Returns the
    /// number of rows changed; zero means the session was never
    /// persisted.
    pub async fn update_expiry(&self, id: i64, expiry: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query("UPDATE sessions SET expiry_time = $2 WHERE id = $1")
            .bind(id)
            .bind(expiry)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to update session expiry", e)
            })?;
        Ok(result.rows_affected())
    }

    /// Find a session by its wire session identifier.
    pub async fn find_by_session_id(&self, session_id: &str) -> AppResult<Option<SessionRow>> {
        sqlx::query_as::<_, SessionRow>("SELECT * FROM sessions WHERE session_id = $1")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find session", e))
    }

    /// List all sessions of a user in insertion order.
    pub async fn find_by_user_id(&self, user_id: i64) -> AppResult<Vec<SessionRow>> {
        sqlx::query_as::<_, SessionRow>(
            "SELECT * FROM sessions WHERE user_id = $1 ORDER BY id ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list sessions", e))
    }
}
