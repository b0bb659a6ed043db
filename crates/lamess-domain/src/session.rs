//! The session entity.

use chrono::{DateTime, Utc};

use lamess_entity::session::SessionRow;
use lamess_presence::packet;

/// One logical presence of a user on a device.
///
/// Created non-persisted from a Register event and attached to its user
/// through [`crate::PeerDirectory::add_session`]. `expiry_time` is the
/// single source of truth for liveness; a session is never deleted,
/// only left to expire.
#[derive(Debug, Clone)]
pub struct Session {
    session_id: String,
    device_preference_index: u8,
    expiry_time: DateTime<Utc>,
    reply_to: String,
    row: Option<SessionRow>,
    owner_user_id: Option<i64>,
}

impl Session {
    /// Create a non-persisted session to be attached to a user.
    pub fn new(
        session_id: &str,
        device_preference_index: u8,
        expiry_time: DateTime<Utc>,
        reply_to: &str,
    ) -> Self {
        Self {
            session_id: session_id.to_string(),
            device_preference_index,
            expiry_time,
            reply_to: reply_to.to_string(),
            row: None,
            owner_user_id: None,
        }
    }

    pub(crate) fn from_row(row: SessionRow) -> Self {
        Self {
            session_id: row.session_id.clone(),
            device_preference_index: u8::try_from(row.device_preference_index)
                .unwrap_or(u8::MAX),
            expiry_time: row.expiry_time,
            reply_to: row.reply_to.clone(),
            owner_user_id: Some(row.user_id),
            row: Some(row),
        }
    }

    pub(crate) fn attach(&mut self, row: SessionRow) {
        self.owner_user_id = Some(row.user_id);
        self.row = Some(row);
    }

    pub(crate) fn stored_id(&self) -> Option<i64> {
        self.row.as_ref().map(|row| row.id)
    }

    pub(crate) fn set_expiry(&mut self, expiry: DateTime<Utc>) {
        self.expiry_time = expiry;
        if let Some(row) = &mut self.row {
            row.expiry_time = expiry;
        }
    }

    /// The wire session identifier.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Preference index of the announcing device; lower wins
    /// main-session selection.
    pub fn device_preference_index(&self) -> u8 {
        self.device_preference_index
    }

    /// Instant after which the session counts as gone.
    pub fn expiry_time(&self) -> DateTime<Utc> {
        self.expiry_time
    }

    /// `ip:port` for direct messages to this session.
    pub fn reply_to(&self) -> &str {
        &self.reply_to
    }

    /// The owning user's store id, when attached.
    pub fn owner_user_id(&self) -> Option<i64> {
        self.owner_user_id
    }

    /// Whether the session is backed by a stored row.
    pub fn is_persisted(&self) -> bool {
        self.row.is_some()
    }

    /// Whether the session has expired as of now.
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expiry_time
    }

    /// Whether this is the running process's own session.
    pub fn is_self(&self) -> bool {
        self.session_id == packet::process_session_id()
    }
}
