//! Authentication payloads.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use giftshop_core::{Email, validate_password};

use crate::error::ValidationError;

/// What a user presents to sign in.
///
/// Implements `Debug` manually to redact secrets.
#[derive(Clone)]
pub enum Credentials {
    /// Email and password.
    Password { email: String, password: SecretString },
    /// Phone number and one-time code.
    PhoneCode { phone: String, code: SecretString },
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Password { email, .. } => f
                .debug_struct("Password")
                .field("email", email)
                .field("password", &"[REDACTED]")
                .finish(),
            Self::PhoneCode { phone, .. } => f
                .debug_struct("PhoneCode")
                .field("phone", phone)
                .field("code", &"[REDACTED]")
                .finish(),
        }
    }
}

impl Credentials {
    /// Email/password credentials.
    #[must_use]
    pub fn password(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Password {
            email: email.into(),
            password: SecretString::from(password.into()),
        }
    }

    /// Phone/code credentials.
    #[must_use]
    pub fn phone_code(phone: impl Into<String>, code: impl Into<String>) -> Self {
        Self::PhoneCode {
            phone: phone.into(),
            code: SecretString::from(code.into()),
        }
    }

    /// Validate locally and build the login request body.
    ///
    /// Password strength is not checked here; existing accounts may predate
    /// the current rules.
    pub(crate) fn to_login_body(&self) -> Result<serde_json::Value, ValidationError> {
        match self {
            Self::Password { email, password } => {
                let email = Email::parse(email)?;
                if password.expose_secret().is_empty() {
                    return Err(ValidationError::MissingField("password"));
                }
                Ok(serde_json::json!({
                    "email": email.as_str(),
                    "password": password.expose_secret(),
                }))
            }
            Self::PhoneCode { phone, code } => {
                let phone = phone.trim();
                if phone.is_empty() {
                    return Err(ValidationError::MissingField("phone"));
                }
                if code.expose_secret().trim().is_empty() {
                    return Err(ValidationError::MissingField("code"));
                }
                Ok(serde_json::json!({
                    "phone": phone,
                    "code": code.expose_secret().trim(),
                }))
            }
        }
    }
}

/// New-account registration form.
#[derive(Clone)]
pub struct SignupForm {
    pub display_name: String,
    pub email: String,
    pub password: SecretString,
    pub password_confirmation: SecretString,
}

impl std::fmt::Debug for SignupForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignupForm")
            .field("display_name", &self.display_name)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

impl SignupForm {
    /// Validate locally and build the registration body.
    pub(crate) fn to_register_body(&self) -> Result<serde_json::Value, ValidationError> {
        let display_name = self.display_name.trim();
        if display_name.is_empty() {
            return Err(ValidationError::MissingField("name"));
        }
        let email = Email::parse(&self.email)?;
        validate_password(self.password.expose_secret())?;
        if self.password.expose_secret() != self.password_confirmation.expose_secret() {
            return Err(ValidationError::PasswordMismatch);
        }
        Ok(serde_json::json!({
            "name": display_name,
            "email": email.as_str(),
            "password": self.password.expose_secret(),
        }))
    }
}

/// Body of a successful login/verify exchange.
///
/// Tokens may arrive in the body, in `Set-Cookie` headers, or both.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TokenGrant {
    #[serde(default, alias = "token")]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}
