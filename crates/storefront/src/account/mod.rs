//! Account management.
//!
//! Registration and the profile/security actions of a signed-in user.

use std::sync::Arc;

use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use tracing::{info, instrument};

use giftshop_core::{Email, validate_password};

use crate::auth::{ApiClient, AuthenticatedRequest};
use crate::error::{ApiError, ValidationError};
use crate::models::{SignupForm, User};
use crate::session::{SessionEnd, SessionStore};

const REGISTER_PATH: &str = "/api/auth/register";
const CHANGE_PASSWORD_PATH: &str = "/api/user/change-password";
const EMAIL_PATH: &str = "/api/user/email";
const ACCOUNT_PATH: &str = "/api/user/me";

/// Phrase the user must type to confirm account deletion.
pub const DELETE_CONFIRMATION: &str = "DELETE";

/// Account service.
#[derive(Debug, Clone)]
pub struct AccountService {
    api: Arc<ApiClient>,
    session: SessionStore,
}

impl AccountService {
    #[must_use]
    pub const fn new(api: Arc<ApiClient>, session: SessionStore) -> Self {
        Self { api, session }
    }

    /// Register a new account.
    ///
    /// The backend normally follows up with a verification code; see
    /// [`SessionStore::verify`].
    ///
    /// # Errors
    ///
    /// `ApiError::ValidationRejected` if the form fails local checks (email
    /// format, password strength, confirmation); otherwise the request
    /// failure.
    #[instrument(skip(self, form), fields(email = %form.email))]
    pub async fn signup(&self, form: &SignupForm) -> Result<(), ApiError> {
        let body = form.to_register_body()?;
        self.api
            .execute(&AuthenticatedRequest::public(Method::POST, REGISTER_PATH).with_body(body))
            .await?;
        info!("Account registered");
        Ok(())
    }

    /// Change the password of the signed-in user.
    ///
    /// # Errors
    ///
    /// `ApiError::ValidationRejected` if the new password is weak or does not
    /// match its confirmation; otherwise the request failure.
    #[instrument(skip_all)]
    pub async fn change_password(
        &self,
        current: &SecretString,
        new: &SecretString,
        confirmation: &SecretString,
    ) -> Result<(), ApiError> {
        if current.expose_secret().is_empty() {
            return Err(ValidationError::MissingField("current password").into());
        }
        validate_password(new.expose_secret()).map_err(ValidationError::from)?;
        if new.expose_secret() != confirmation.expose_secret() {
            return Err(ValidationError::PasswordMismatch.into());
        }

        let body = serde_json::json!({
            "currentPassword": current.expose_secret(),
            "newPassword": new.expose_secret(),
        });
        self.api
            .execute(&AuthenticatedRequest::post(CHANGE_PASSWORD_PATH).with_body(body))
            .await?;
        info!("Password changed");
        Ok(())
    }

    /// Change the email of the signed-in user and refresh the identity.
    ///
    /// # Errors
    ///
    /// `ApiError::ValidationRejected` for a malformed address; otherwise the
    /// request failure.
    #[instrument(skip(self))]
    pub async fn change_email(&self, new_email: &str) -> Result<Option<User>, ApiError> {
        let email = Email::parse(new_email).map_err(ValidationError::from)?;
        self.api
            .execute(
                &AuthenticatedRequest::patch(EMAIL_PATH)
                    .with_body(serde_json::json!({ "email": email.as_str() })),
            )
            .await?;
        info!("Email changed");
        Ok(self.session.check_status().await)
    }

    /// Permanently delete the signed-in account and end the session.
    ///
    /// # Errors
    ///
    /// `ApiError::ValidationRejected` unless `confirmation` is exactly
    /// [`DELETE_CONFIRMATION`]; otherwise the request failure, in which case
    /// the session is kept.
    #[instrument(skip(self))]
    pub async fn delete_account(&self, confirmation: &str) -> Result<(), ApiError> {
        if confirmation != DELETE_CONFIRMATION {
            return Err(ValidationError::ConfirmationMismatch.into());
        }
        self.api.execute(&AuthenticatedRequest::delete(ACCOUNT_PATH)).await?;
        self.session.end(SessionEnd::AccountDeleted);
        info!("Account deleted");
        Ok(())
    }
}
