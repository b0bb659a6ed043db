//! The peer directory service.

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use lamess_core::error::AppError;
use lamess_core::result::AppResult;
use lamess_database::repositories::{SessionRepository, UserRepository};
use lamess_entity::profile::UserProfile;
use lamess_entity::session::CreateSessionRow;

use crate::session::Session;
use crate::user::User;

/// Tracks known users and their device sessions over the repositories.
///
/// The directory is shared between the broadcast event handlers, which
/// write on Register/Ping/SignOff, and application code, which reads.
/// A single mutex serializes the check-then-persist paths that attach
/// sessions to users.
pub struct PeerDirectory {
    users: UserRepository,
    sessions: SessionRepository,
    attach_lock: Mutex<()>,
}

impl PeerDirectory {
    /// Create a directory over the given repositories.
    pub fn new(users: UserRepository, sessions: SessionRepository) -> Self {
        Self {
            users,
            sessions,
            attach_lock: Mutex::new(()),
        }
    }

    /// Idempotent upsert by username; returns the persisted user.
    pub async fn new_user(&self, profile: &UserProfile) -> AppResult<User> {
        let _guard = self.attach_lock.lock().await;
        let row = self.users.upsert_by_username(profile).await?;
        User::from_row(row)
    }

    /// Look a user up by username.
    pub async fn user_by_username(&self, username: &str) -> AppResult<Option<User>> {
        match self.users.find_by_username(username).await? {
            Some(row) => Ok(Some(User::from_row(row)?)),
            None => Ok(None),
        }
    }

    /// Attach a non-persisted session to a persisted user.
    ///
    /// Returns `Ok(false)` when the session instance is already attached
    /// to this user. Attaching to a non-persisted user, or re-attaching
    /// a session owned by a different user, is an
    /// [`ErrorKind::InvalidState`] misuse; a conflicting stored session
    /// with the same session ID surfaces as [`ErrorKind::SaveFailed`].
    pub async fn add_session(&self, user: &User, session: &mut Session) -> AppResult<bool> {
        let Some(user_id) = user.id() else {
            return Err(AppError::invalid_state(
                "session being added to a user before being persisted",
            ));
        };
        if session.is_persisted() {
            if session.owner_user_id() != Some(user_id) {
                return Err(AppError::invalid_state(
                    "session already belongs to another user",
                ));
            }
            return Ok(false);
        }

        let _guard = self.attach_lock.lock().await;
        let row = self
            .sessions
            .insert(&CreateSessionRow {
                user_id,
                session_id: session.session_id().to_string(),
                device_preference_index: i64::from(session.device_preference_index()),
                expiry_time: session.expiry_time(),
                reply_to: session.reply_to().to_string(),
            })
            .await?;
        session.attach(row);
        debug!(
            username = user.profile().username(),
            session_id = session.session_id(),
            "Session attached"
        );
        Ok(true)
    }

    /// The user's non-expired sessions, in insertion order.
    pub async fn active_sessions(&self, user: &User) -> AppResult<Vec<Session>> {
        let Some(user_id) = user.id() else {
            return Ok(Vec::new());
        };
        let rows = self.sessions.find_by_user_id(user_id).await?;
        Ok(rows
            .into_iter()
            .filter(|row| !row.is_expired())
            .map(Session::from_row)
            .collect())
    }

    /// The active session with the lowest device preference index; ties
    /// go to the earliest-inserted session.
    pub async fn main_session(&self, user: &User) -> AppResult<Option<Session>> {
        let sessions = self.active_sessions(user).await?;
        let mut main: Option<Session> = None;
        for session in sessions {
            match &main {
                Some(current)
                    if session.device_preference_index()
                        >= current.device_preference_index() => {}
                _ => main = Some(session),
            }
        }
        Ok(main)
    }

    /// Load a session by its wire session identifier, with the owning
    /// user attached as a store reference.
    pub async fn session_by_id(&self, session_id: &str) -> AppResult<Option<Session>> {
        Ok(self
            .sessions
            .find_by_session_id(session_id)
            .await?
            .map(Session::from_row))
    }

    /// Resolve a session's owning user through the repository.
    pub async fn session_owner(&self, session: &Session) -> AppResult<Option<User>> {
        let Some(user_id) = session.owner_user_id() else {
            return Ok(None);
        };
        match self.users.find_by_id(user_id).await? {
            Some(row) => Ok(Some(User::from_row(row)?)),
            None => Ok(None),
        }
    }

    /// Renew a session until the newly specified instant, which must be
    /// strictly in the future.
    pub async fn renew(&self, session: &mut Session, new_expiry: DateTime<Utc>) -> AppResult<()> {
        if Utc::now() >= new_expiry {
            return Err(AppError::invalid_renew_time(
                "renew time can not be from past",
            ));
        }
        let Some(stored_id) = session.stored_id() else {
            return Err(AppError::renew_failure("renew of an unpersisted session"));
        };
        let rows_affected = self.sessions.update_expiry(stored_id, new_expiry).await?;
        if rows_affected < 1 {
            return Err(AppError::renew_failure("renew session failed"));
        }
        session.set_expiry(new_expiry);
        Ok(())
    }

    /// Mark a session signed off by expiring it in the past.
    pub async fn sign_off(&self, session: &mut Session) -> AppResult<()> {
        let Some(stored_id) = session.stored_id() else {
            return Err(AppError::invalid_state("sign-off of an unpersisted session"));
        };
        let past = Utc::now() - Duration::seconds(1);
        let rows_affected = self.sessions.update_expiry(stored_id, past).await?;
        if rows_affected < 1 {
            return Err(AppError::renew_failure("sign-off updated no rows"));
        }
        session.set_expiry(past);
        Ok(())
    }
}
