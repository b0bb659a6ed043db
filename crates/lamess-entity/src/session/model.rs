//! Session row model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One logical presence of a user on a device.
///
/// A session is kept alive by periodic pings that push `expiry_time`
/// forward; it is never deleted, only left to expire. `expiry_time` is
/// the single source of truth for liveness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct SessionRow {
    /// Surrogate primary key.
    pub id: i64,
    /// Owning user.
    pub user_id: i64,
    /// Globally unique session identifier (UUID string), as announced
    /// on the wire.
    pub session_id: String,
    /// Preference index of the announcing device; lower wins
    /// main-session selection.
    pub device_preference_index: i64,
    /// Instant after which the session counts as gone.
    pub expiry_time: DateTime<Utc>,
    /// `ip:port` peers should use for direct messages to this session.
    pub reply_to: String,
}

impl SessionRow {
    /// Whether the session has expired as of now.
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expiry_time
    }
}

/// Data required to persist a new session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionRow {
    /// Owning user.
    pub user_id: i64,
    /// Globally unique session identifier.
    pub session_id: String,
    /// Device preference index.
    pub device_preference_index: i64,
    /// Expiry instant.
    pub expiry_time: DateTime<Utc>,
    /// Reply-to connection string.
    pub reply_to: String,
}
