//! User repository implementation.

use sqlx::SqlitePool;

use lamess_core::error::{AppError, ErrorKind};
use lamess_core::result::AppResult;
use lamess_entity::profile::UserProfile;
use lamess_entity::user::UserRow;

/// Repository for user rows.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    /// Create a new user repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or refresh the user identified by the profile's username
    /// and return the persisted row.
    pub async fn upsert_by_username(&self, profile: &UserProfile) -> AppResult<UserRow> {
        sqlx::query_as::<_, UserRow>(
            "INSERT INTO users (username, display_name, email) VALUES ($1, $2, $3) \
             ON CONFLICT(username) DO UPDATE SET \
               display_name = excluded.display_name, email = excluded.email \
             RETURNING *",
        )
        .bind(profile.username())
        .bind(profile.display_name())
        .bind(profile.email())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to upsert user", e))
    }

    /// Find a user by username.
    pub async fn find_by_username(&self, username: &str) -> AppResult<Option<UserRow>> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find user", e))
    }

    /// Find a user by primary key.
    pub async fn find_by_id(&self, id: i64) -> AppResult<Option<UserRow>> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find user", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::DatabasePool;
    use crate::migration::run_migrations;

    async fn repo() -> UserRepository {
        let db = DatabasePool::connect_in_memory().await.expect("open db");
        run_migrations(db.pool()).await.expect("migrate");
        UserRepository::new(db.pool().clone())
    }

    fn profile() -> UserProfile {
        UserProfile::new("nicename", "What to Show", "user@email.co").expect("valid profile")
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent_by_username() {
        let users = repo().await;
        let first = users.upsert_by_username(&profile()).await.expect("insert");
        let second = users.upsert_by_username(&profile()).await.expect("upsert");
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_upsert_refreshes_display_name() {
        let users = repo().await;
        users.upsert_by_username(&profile()).await.expect("insert");
        let updated = UserProfile::new("nicename", "Renamed", "user@email.co").expect("profile");
        let row = users.upsert_by_username(&updated).await.expect("upsert");
        assert_eq!(row.display_name, "Renamed");

        let loaded = users
            .find_by_username("nicename")
            .await
            .expect("query")
            .expect("row present");
        assert_eq!(loaded.display_name, "Renamed");
    }

    #[tokio::test]
    async fn test_find_missing_returns_none() {
        let users = repo().await;
        assert!(users
            .find_by_username("nobody")
            .await
            .expect("query")
            .is_none());
    }
}
