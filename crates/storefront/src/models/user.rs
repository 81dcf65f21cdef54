//! User identity types.

use serde::{Deserialize, Serialize};

use giftshop_core::UserId;

/// The authenticated identity, as returned by `GET /api/user/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Name shown in the account menu.
    #[serde(default, alias = "name")]
    pub display_name: String,
    /// Email on file, if any.
    #[serde(default)]
    pub email: Option<String>,
    /// Phone on file, if any.
    #[serde(default)]
    pub phone: Option<String>,
    /// Whether the email has been verified.
    #[serde(default)]
    pub email_verified: bool,
    /// Whether the phone number has been verified.
    #[serde(default)]
    pub phone_verified: bool,
}

impl User {
    /// An unverified user with no contact details.
    #[must_use]
    pub fn new(id: impl Into<UserId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            email: None,
            phone: None,
            email_verified: false,
            phone_verified: false,
        }
    }

    /// Whether at least one contact channel is verified.
    #[must_use]
    pub const fn is_verified(&self) -> bool {
        self.email_verified || self.phone_verified
    }
}

/// `/api/user/me` answers either `{ "user": {...} }` or the bare user.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum UserEnvelope {
    Wrapped { user: User },
    Bare(User),
}

impl From<UserEnvelope> for User {
    fn from(envelope: UserEnvelope) -> Self {
        match envelope {
            UserEnvelope::Wrapped { user } | UserEnvelope::Bare(user) => user,
        }
    }
}
