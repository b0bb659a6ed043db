//! The user entity.

use lamess_core::result::AppResult;
use lamess_entity::profile::UserProfile;
use lamess_entity::user::UserRow;

/// A known user of the network, uniquely keyed by username.
#[derive(Debug, Clone)]
pub struct User {
    profile: UserProfile,
    row: Option<UserRow>,
}

impl User {
    pub(crate) fn from_row(row: UserRow) -> AppResult<Self> {
        let profile = UserProfile::new(&row.username, &row.display_name, &row.email)?;
        Ok(Self {
            profile,
            row: Some(row),
        })
    }

    /// The user's validated profile.
    pub fn profile(&self) -> &UserProfile {
        &self.profile
    }

    /// Whether the user is backed by a stored row.
    pub fn is_persisted(&self) -> bool {
        self.row.is_some()
    }

    /// Store primary key, when persisted.
    pub fn id(&self) -> Option<i64> {
        self.row.as_ref().map(|row| row.id)
    }
}
