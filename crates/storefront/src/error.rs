//! Unified error handling for the storefront client.
//!
//! [`ApiError`] is the taxonomy every write path propagates. Read paths never
//! surface it; they degrade to empty/zero at their own boundary.

use giftshop_core::{EmailError, PasswordError, QuantityError};
use reqwest::StatusCode;
use thiserror::Error;

use crate::config::ConfigError;
use crate::transport::TransportError;

/// A local precondition failure, rejected before any network call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Quantity below one.
    #[error("{0}")]
    QuantityBelowOne(#[from] QuantityError),

    /// Typed confirmation phrase did not match.
    #[error("confirmation phrase does not match")]
    ConfirmationMismatch,

    /// Password below the strength threshold.
    #[error("{0}")]
    WeakPassword(#[from] PasswordError),

    /// Password and its confirmation differ.
    #[error("passwords do not match")]
    PasswordMismatch,

    /// Malformed email address.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// A required field was left empty.
    #[error("{0} is required")]
    MissingField(&'static str),
}

/// Errors surfaced by authenticated and public API operations.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No credential, or the refresh exchange failed. The session is over.
    #[error("authentication required")]
    Unauthenticated,

    /// The server answered with a non-2xx status.
    #[error("request failed ({status}): {message}")]
    RequestFailed { status: StatusCode, message: String },

    /// Local precondition failed; nothing was sent.
    #[error("validation failed: {0}")]
    ValidationRejected(#[from] ValidationError),

    /// Network/transport failure; no status was received.
    #[error("network error: {0}")]
    Network(#[from] TransportError),

    /// A successful response body could not be decoded.
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Client configuration is missing or invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ApiError {
    /// Whether the caller should route the user toward login.
    #[must_use]
    pub const fn requires_login(&self) -> bool {
        matches!(self, Self::Unauthenticated)
    }

    /// Whether repeating a read could plausibly succeed.
    ///
    /// True for network failures and 5xx answers.
    #[must_use]
    pub fn is_retryable_read(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::RequestFailed { status, .. } => status.is_server_error(),
            _ => false,
        }
    }

    /// HTTP status associated with the failure, if the server answered.
    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        match self {
            Self::RequestFailed { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Short message suitable for a toast notification.
    ///
    /// Never exposes transport or decoding internals.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Unauthenticated => "Please sign in to continue".to_string(),
            Self::RequestFailed { status, message } => {
                if status.is_server_error() {
                    "Something went wrong, please try again".to_string()
                } else {
                    message.clone()
                }
            }
            Self::ValidationRejected(err) => capitalize(&err.to_string()),
            Self::Network(_) => "Network problem, please check your connection".to_string(),
            Self::Decode(_) | Self::Config(_) => "Something went wrong, please try again".to_string(),
        }
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// Result type alias for `ApiError`.
pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let err = ApiError::RequestFailed {
            status: StatusCode::CONFLICT,
            message: "Out of stock".to_string(),
        };
        assert_eq!(err.to_string(), "request failed (409 Conflict): Out of stock");
        assert_eq!(err.status(), Some(StatusCode::CONFLICT));
        assert_eq!(ApiError::Unauthenticated.to_string(), "authentication required");
    }

    #[test]
    fn test_user_messages_hide_internals() {
        let server = ApiError::RequestFailed {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "NullPointerException at line 42".to_string(),
        };
        assert_eq!(server.user_message(), "Something went wrong, please try again");

        let network = ApiError::Network(TransportError::Connect("dns failure".to_string()));
        assert!(!network.user_message().contains("dns"));

        let validation = ApiError::from(ValidationError::QuantityBelowOne(QuantityError(0)));
        assert_eq!(validation.user_message(), "Quantity must be at least 1 (got 0)");
    }

    #[test]
    fn test_requires_login() {
        assert!(ApiError::Unauthenticated.requires_login());
        assert!(!ApiError::from(ValidationError::ConfirmationMismatch).requires_login());
    }

    #[test]
    fn test_retryable_reads() {
        let network = ApiError::Network(TransportError::Timeout);
        let unavailable = ApiError::RequestFailed {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: String::new(),
        };
        let missing = ApiError::RequestFailed {
            status: StatusCode::NOT_FOUND,
            message: String::new(),
        };
        assert!(network.is_retryable_read());
        assert!(unavailable.is_retryable_read());
        assert!(!missing.is_retryable_read());
        assert!(!ApiError::Unauthenticated.is_retryable_read());
    }
}
