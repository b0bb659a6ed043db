//! The user profile value type.

use lamess_core::error::AppError;
use lamess_core::result::AppResult;
use lamess_core::validate;

/// The identity a node announces: username, display name, and e-mail.
///
/// Constructed once through [`UserProfile::new`], which enforces the
/// profile invariants; instances are immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    username: String,
    display_name: String,
    email: String,
}

impl UserProfile {
    /// Build a profile, rejecting blank or malformed attributes.
    pub fn new(username: &str, display_name: &str, email: &str) -> AppResult<Self> {
        if validate::is_blank(username) || validate::is_blank(display_name)
            || validate::is_blank(email)
        {
            return Err(AppError::invalid_input(
                "none of the user profile attributes are optional",
            ));
        }
        if !validate::is_alphanumeric_with_space(username)
            || !validate::is_alphanumeric_with_space(display_name)
        {
            return Err(AppError::invalid_input(
                "username and display name must be alphanumeric",
            ));
        }
        if !validate::is_valid_email(email) {
            return Err(AppError::invalid_input(format!(
                "email {email:?} is not well formatted"
            )));
        }
        Ok(Self {
            username: username.to_string(),
            display_name: display_name.to_string(),
            email: email.to_string(),
        })
    }

    /// Unique handle of the user.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Name shown to peers.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Contact e-mail.
    pub fn email(&self) -> &str {
        &self.email
    }
}
