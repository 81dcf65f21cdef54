//! Session lifecycle.
//!
//! [`SessionStore`] owns identity: it probes the backend, logs in and out,
//! and publishes the current [`User`] through the shared [`SessionCell`].

mod cell;

pub use cell::{SessionBound, SessionCell, SessionEnd};

use std::sync::Arc;

use reqwest::Method;
use secrecy::SecretString;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use giftshop_core::Email;

use crate::auth::{ApiClient, AuthenticatedRequest};
use crate::error::{ApiError, ValidationError};
use crate::models::{Credentials, User};
use crate::models::auth::TokenGrant;
use crate::models::user::UserEnvelope;

pub(crate) const ME_PATH: &str = "/api/user/me";
const LOGIN_PATH: &str = "/api/auth/login";
const VERIFY_PATH: &str = "/api/auth/verify";
const LOGOUT_PATH: &str = "/api/auth/logout";

/// Login, logout, and identity probing.
///
/// Cheap to clone; clones share state.
#[derive(Debug, Clone)]
pub struct SessionStore {
    api: Arc<ApiClient>,
}

impl SessionStore {
    #[must_use]
    pub const fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    fn cell(&self) -> &SessionCell {
        self.api.session()
    }

    /// The current identity, if any.
    #[must_use]
    pub fn identity(&self) -> Option<User> {
        self.cell().identity()
    }

    /// Whether a session is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.cell().is_active()
    }

    /// Watch identity changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<User>> {
        self.cell().subscribe()
    }

    /// Ask the backend who we are and publish the answer.
    ///
    /// Never fails: any error, including network failure, means "no
    /// session".
    #[instrument(skip(self))]
    pub async fn check_status(&self) -> Option<User> {
        if !self.api.session().gateway().jar().has_credentials() {
            debug!("No credential held, skipping probe");
            self.cell().set_identity(None);
            return None;
        }

        let user = match self.api.execute(&AuthenticatedRequest::get(ME_PATH)).await {
            Ok(response) => match response.json::<UserEnvelope>() {
                Ok(envelope) => Some(User::from(envelope)),
                Err(e) => {
                    warn!(error = %e, "Malformed identity response");
                    None
                }
            },
            Err(e) => {
                debug!(error = %e, "No active session");
                None
            }
        };

        if let Some(user) = &user {
            debug!(user_id = %user.id, "Session active");
        }
        self.cell().set_identity(user.clone());
        user
    }

    /// Exchange credentials for a session.
    ///
    /// On failure the previous state is left untouched.
    ///
    /// # Errors
    ///
    /// - `ApiError::ValidationRejected` for locally invalid credentials.
    /// - `ApiError::RequestFailed` if the backend refuses them.
    /// - `ApiError::Unauthenticated` if the backend accepted them but the
    ///   follow-up identity probe failed.
    #[instrument(skip(self, credentials))]
    pub async fn login(&self, credentials: &Credentials) -> Result<User, ApiError> {
        let body = credentials.to_login_body()?;
        let request = AuthenticatedRequest::public(Method::POST, LOGIN_PATH).with_body(body);
        self.establish(&request).await
    }

    /// Complete sign-in with a one-time verification code.
    ///
    /// # Errors
    ///
    /// Same as [`login`](Self::login).
    #[instrument(skip(self, code))]
    pub async fn verify(&self, email: &str, code: &str) -> Result<User, ApiError> {
        let email = Email::parse(email).map_err(ValidationError::from)?;
        let code = code.trim();
        if code.is_empty() {
            return Err(ValidationError::MissingField("code").into());
        }
        let request = AuthenticatedRequest::public(Method::POST, VERIFY_PATH).with_body(
            serde_json::json!({ "email": email.as_str(), "code": code }),
        );
        self.establish(&request).await
    }

    async fn establish(&self, request: &AuthenticatedRequest) -> Result<User, ApiError> {
        let response = self.api.execute(request).await?;

        let grant = response.json::<Option<TokenGrant>>().unwrap_or_else(|e| {
            debug!(error = %e, "Login body carried no tokens");
            None
        });
        if let Some(grant) = grant {
            let jar = self.api.session().gateway().jar();
            if let Some(access) = grant.access_token {
                jar.store_access(SecretString::from(access));
            }
            if let Some(refresh) = grant.refresh_token {
                jar.store_refresh(SecretString::from(refresh));
            }
        }

        let user = self.check_status().await.ok_or(ApiError::Unauthenticated)?;
        info!(user_id = %user.id, "Logged in");
        Ok(user)
    }

    /// End the session.
    ///
    /// The server call is best-effort; local state is cleared regardless.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        if self.api.session().gateway().jar().has_credentials() {
            let request = AuthenticatedRequest::public(Method::POST, LOGOUT_PATH);
            if let Err(e) = self.api.execute(&request).await {
                warn!(error = %e, "Server-side logout failed");
            }
        }
        self.cell().end(SessionEnd::Logout);
    }

    /// End the session locally without contacting the server.
    pub(crate) fn end(&self, reason: SessionEnd) {
        self.cell().end(reason);
    }
}
