//! Profile section: the identity this node announces to its peers.

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::validate;

/// `[profile]` configuration. All keys are required.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// Unique handle, alphanumeric with spaces.
    pub username: String,
    /// Name shown to peers, alphanumeric with spaces.
    pub displayname: String,
    /// Contact e-mail.
    pub email: String,
}

impl ProfileConfig {
    /// Check the configured values against the same rules the packet
    /// builder applies, so a bad profile fails at startup rather than at
    /// the first broadcast.
    pub fn validate(&self) -> Result<(), AppError> {
        if validate::is_blank(&self.username)
            || validate::is_blank(&self.displayname)
            || validate::is_blank(&self.email)
        {
            return Err(AppError::configuration(
                "profile username, displayname, and email are all required",
            ));
        }
        if !validate::is_alphanumeric_with_space(&self.username)
            || !validate::is_alphanumeric_with_space(&self.displayname)
        {
            return Err(AppError::configuration(
                "profile username and displayname must be alphanumeric",
            ));
        }
        if !validate::is_valid_email(&self.email) {
            return Err(AppError::configuration(format!(
                "profile email {:?} is not well formatted",
                self.email
            )));
        }
        Ok(())
    }
}
