//! Client-side input validation

use crate::constants::MIN_USERNAME_LENGTH;

/// Validate a username before submitting a login or registration.
///
/// Returns the user-facing message for the first failing rule, or `None`
/// when the username is acceptable.
#[must_use]
pub fn validate_username(username: &str) -> Option<&'static str> {
    if username.is_empty() {
        return Some("can't be blank");
    }
    if username.chars().count() < MIN_USERNAME_LENGTH {
        return Some("must be at least 3 characters");
    }
    None
}
