//! User row model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A persisted user, uniquely keyed by username.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct UserRow {
    /// Surrogate primary key.
    pub id: i64,
    /// Unique handle.
    pub username: String,
    /// Name shown to peers.
    pub display_name: String,
    /// Contact e-mail.
    pub email: String,
}
