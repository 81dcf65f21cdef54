//! Password strength rules enforced before any credential leaves the client.

use thiserror::Error;

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum password length accepted by the backend.
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Reasons a password is rejected locally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PasswordError {
    #[error("password must be at least {MIN_PASSWORD_LENGTH} characters")]
    TooShort,
    #[error("password must be at most {MAX_PASSWORD_LENGTH} characters")]
    TooLong,
    #[error("password must contain at least one letter")]
    MissingLetter,
    #[error("password must contain at least one digit")]
    MissingDigit,
}

/// Check a candidate password against the storefront's strength threshold.
///
/// # Errors
///
/// Returns the first [`PasswordError`] the password violates.
pub fn validate_password(password: &str) -> Result<(), PasswordError> {
    let length = password.chars().count();
    if length < MIN_PASSWORD_LENGTH {
        return Err(PasswordError::TooShort);
    }
    if length > MAX_PASSWORD_LENGTH {
        return Err(PasswordError::TooLong);
    }
    if !password.chars().any(char::is_alphabetic) {
        return Err(PasswordError::MissingLetter);
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(PasswordError::MissingDigit);
    }
    Ok(())
}
