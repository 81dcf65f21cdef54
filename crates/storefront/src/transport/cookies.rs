//! Credential cookie jar.
//!
//! The jar is the only place that holds credential values. It plays the
//! role a browser's cookie store plays for `httpOnly` cookies: it absorbs
//! `Set-Cookie` headers from every response, replays the cookies on every
//! request, and lets the rest of the client observe whether a credential
//! exists without ever reading it.
//!
//! Cookie names match the backend convention: `access_token`, `refresh_token`.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use cookie::Cookie;
use secrecy::{ExposeSecret, SecretString};

pub use cookie::SameSite;

/// Cookie name for the access token.
pub const ACCESS_COOKIE: &str = "access_token";
/// Cookie name for the refresh token.
pub const REFRESH_COOKIE: &str = "refresh_token";

/// Lifetime of the access cookie (10 days).
pub const ACCESS_MAX_AGE: Duration = Duration::from_secs(10 * 24 * 60 * 60);
/// Lifetime of the refresh cookie (30 days).
pub const REFRESH_MAX_AGE: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Attributes recorded alongside a stored credential cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieAttributes {
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SameSite,
    pub path: String,
    pub max_age: Option<Duration>,
}

impl CookieAttributes {
    /// Attributes for a credential cookie: `HttpOnly`, `SameSite=Lax`, path `/`.
    #[must_use]
    pub fn credential(secure: bool, max_age: Duration) -> Self {
        Self {
            http_only: true,
            secure,
            same_site: SameSite::Lax,
            path: "/".to_string(),
            max_age: Some(max_age),
        }
    }
}

struct StoredCookie {
    value: SecretString,
    attributes: CookieAttributes,
    expires_at: Option<DateTime<Utc>>,
}

impl StoredCookie {
    fn new(value: SecretString, attributes: CookieAttributes, now: DateTime<Utc>) -> Self {
        let expires_at = attributes
            .max_age
            .and_then(|age| chrono::Duration::from_std(age).ok())
            .and_then(|age| now.checked_add_signed(age));
        Self {
            value,
            attributes,
            expires_at,
        }
    }

    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|expires_at| now < expires_at)
    }
}

#[derive(Default)]
struct JarState {
    access: Option<StoredCookie>,
    refresh: Option<StoredCookie>,
    epoch: u64,
}

impl JarState {
    fn set_access(&mut self, cookie: Option<StoredCookie>) {
        self.access = cookie;
        self.epoch = self.epoch.wrapping_add(1);
    }
}

/// A parsed `Set-Cookie` header.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct SetCookie {
    pub name: String,
    pub value: String,
    pub attributes: CookieAttributes,
    pub removal: bool,
}

/// In-memory holder of the access and refresh credential cookies.
///
/// Non-persistent: a new jar starts empty.
pub struct CredentialJar {
    secure: bool,
    state: Mutex<JarState>,
}

impl std::fmt::Debug for CredentialJar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("CredentialJar")
            .field("secure", &self.secure)
            .field("access", &state.access.as_ref().map(|_| "[REDACTED]"))
            .field("refresh", &state.refresh.as_ref().map(|_| "[REDACTED]"))
            .field("epoch", &state.epoch)
            .finish()
    }
}

impl CredentialJar {
    /// Create an empty jar. `secure` marks stored cookies `Secure`.
    #[must_use]
    pub fn new(secure: bool) -> Self {
        Self {
            secure,
            state: Mutex::new(JarState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, JarState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store an access credential returned in a response body.
    pub fn store_access(&self, token: SecretString) {
        let cookie = StoredCookie::new(
            token,
            CookieAttributes::credential(self.secure, ACCESS_MAX_AGE),
            Utc::now(),
        );
        self.lock().set_access(Some(cookie));
    }

    /// Store a refresh credential returned in a response body.
    pub fn store_refresh(&self, token: SecretString) {
        let cookie = StoredCookie::new(
            token,
            CookieAttributes::credential(self.secure, REFRESH_MAX_AGE),
            Utc::now(),
        );
        self.lock().refresh = Some(cookie);
    }

    /// Apply `Set-Cookie` headers from a response.
    ///
    /// Only the credential cookies are tracked; anything else is ignored.
    pub fn absorb<S: AsRef<str>>(&self, headers: &[S]) {
        let now = Utc::now();
        let mut state = self.lock();
        for header in headers {
            let Some(cookie) = parse_set_cookie(header.as_ref(), now) else {
                continue;
            };
            let stored = (!cookie.removal).then(|| {
                StoredCookie::new(SecretString::from(cookie.value), cookie.attributes, now)
            });
            match cookie.name.as_str() {
                ACCESS_COOKIE => state.set_access(stored),
                REFRESH_COOKIE => state.refresh = stored,
                _ => {}
            }
        }
    }

    /// Whether a live access credential is held.
    #[must_use]
    pub fn has_access(&self) -> bool {
        let now = Utc::now();
        self.lock().access.as_ref().is_some_and(|c| c.is_live(now))
    }

    /// Whether any live credential (access or refresh) is held.
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        let now = Utc::now();
        let state = self.lock();
        state.access.as_ref().is_some_and(|c| c.is_live(now))
            || state.refresh.as_ref().is_some_and(|c| c.is_live(now))
    }

    /// Counter bumped every time the access credential is set or removed.
    ///
    /// Lets a caller tell whether the credential changed since it last sent
    /// a request.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.lock().epoch
    }

    /// Attributes of the held access cookie, if any.
    #[must_use]
    pub fn access_attributes(&self) -> Option<CookieAttributes> {
        self.lock().access.as_ref().map(|c| c.attributes.clone())
    }

    /// Drop both credentials.
    pub fn clear(&self) {
        let mut state = self.lock();
        if state.access.is_some() {
            state.set_access(None);
        }
        state.refresh = None;
    }

    /// The access credential for an `Authorization: Bearer` header.
    pub(crate) fn bearer(&self) -> Option<SecretString> {
        let now = Utc::now();
        self.lock()
            .access
            .as_ref()
            .filter(|c| c.is_live(now))
            .map(|c| SecretString::from(c.value.expose_secret().to_owned()))
    }

    /// The `Cookie` header replaying every live credential.
    pub(crate) fn cookie_header(&self) -> Option<SecretString> {
        let now = Utc::now();
        let state = self.lock();
        let pairs: Vec<String> = [
            (ACCESS_COOKIE, state.access.as_ref()),
            (REFRESH_COOKIE, state.refresh.as_ref()),
        ]
        .into_iter()
        .filter_map(|(name, cookie)| {
            cookie
                .filter(|c| c.is_live(now))
                .map(|c| format!("{name}={}", c.value.expose_secret()))
        })
        .collect();

        (!pairs.is_empty()).then(|| SecretString::from(pairs.join("; ")))
    }
}

/// Parse one `Set-Cookie` header value.
///
/// A cookie is a removal when its value is empty, `Max-Age` is zero or
/// negative, or `Expires` lies in the past. `Max-Age` wins over `Expires`.
/// Missing attributes default to `Path=/` and `SameSite=Lax`.
pub(crate) fn parse_set_cookie(header: &str, now: DateTime<Utc>) -> Option<SetCookie> {
    let cookie = Cookie::parse(header).ok()?;

    let max_age_secs = cookie.max_age().map(|age| age.whole_seconds());
    let expires_at = cookie
        .expires_datetime()
        .and_then(|at| DateTime::<Utc>::from_timestamp(at.unix_timestamp(), 0));

    let (max_age, expired) = match max_age_secs {
        Some(secs) => (
            u64::try_from(secs).ok().filter(|secs| *secs > 0).map(Duration::from_secs),
            secs <= 0,
        ),
        None => match expires_at {
            Some(at) if at <= now => (None, true),
            Some(at) => ((at - now).to_std().ok(), false),
            None => (None, false),
        },
    };

    let value = cookie.value_trimmed().to_string();
    let removal = value.is_empty() || expired;

    Some(SetCookie {
        name: cookie.name().to_string(),
        value,
        attributes: CookieAttributes {
            http_only: cookie.http_only().unwrap_or(false),
            secure: cookie.secure().unwrap_or(false),
            same_site: cookie.same_site().unwrap_or(SameSite::Lax),
            path: cookie.path().unwrap_or("/").to_string(),
            max_age,
        },
        removal,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_set_cookie_attributes() {
        let cookie = parse_set_cookie(
            "access_token=abc123; Path=/; HttpOnly; Secure; SameSite=Lax; Max-Age=864000",
            Utc::now(),
        )
        .unwrap();
        assert_eq!(cookie.name, ACCESS_COOKIE);
        assert_eq!(cookie.value, "abc123");
        assert!(!cookie.removal);
        assert_eq!(
            cookie.attributes,
            CookieAttributes::credential(true, ACCESS_MAX_AGE)
        );
    }

    #[test]
    fn test_parse_set_cookie_removals() {
        let now = Utc::now();
        assert!(parse_set_cookie("access_token=; Path=/", now).unwrap().removal);
        assert!(parse_set_cookie("access_token=x; Max-Age=0", now).unwrap().removal);
        assert!(
            parse_set_cookie("access_token=x; Expires=Thu, 01 Jan 1970 00:00:00 GMT", now)
                .unwrap()
                .removal
        );
        assert!(parse_set_cookie("access_token=x; Max-Age=-5", now).unwrap().removal);
        assert!(parse_set_cookie("garbage", now).is_none());
    }

    #[test]
    fn test_max_age_wins_over_expires() {
        let now = Utc::now();
        let cookie = parse_set_cookie(
            "refresh_token=r1; Max-Age=60; Expires=Thu, 01 Jan 1970 00:00:00 GMT",
            now,
        )
        .unwrap();
        assert!(!cookie.removal);
        assert_eq!(cookie.attributes.max_age, Some(Duration::from_secs(60)));

        let future = parse_set_cookie("refresh_token=r1; Expires=Fri, 01 Jan 2100 00:00:00 GMT", now)
            .unwrap();
        assert!(!future.removal);
        assert!(future.attributes.max_age.is_some());
    }

    #[test]
    fn test_parse_defaults_and_quoted_values() {
        let cookie = parse_set_cookie("access_token=\"a1\"; SameSite=Strict", Utc::now()).unwrap();
        assert_eq!(cookie.value, "a1");
        assert_eq!(cookie.attributes.same_site, SameSite::Strict);
        assert_eq!(cookie.attributes.path, "/");
        assert!(!cookie.attributes.http_only);
        assert_eq!(cookie.attributes.max_age, None);
    }

    #[test]
    fn test_absorb_tracks_credentials_and_epoch() {
        let jar = CredentialJar::new(false);
        assert!(!jar.has_credentials());
        let start = jar.epoch();

        jar.absorb(&[
            "access_token=a1; HttpOnly; Path=/",
            "refresh_token=r1; HttpOnly; Path=/",
            "theme=dark",
        ]);
        assert!(jar.has_access());
        assert_eq!(jar.epoch(), start + 1);
        assert_eq!(
            jar.cookie_header().map(|c| c.expose_secret().to_owned()),
            Some("access_token=a1; refresh_token=r1".to_string())
        );

        jar.absorb(&["access_token=; Max-Age=0"]);
        assert!(!jar.has_access());
        assert!(jar.has_credentials());
        assert_eq!(jar.epoch(), start + 2);
    }

    #[test]
    fn test_store_access_uses_credential_attributes() {
        let jar = CredentialJar::new(true);
        jar.store_access(SecretString::from("tok".to_string()));

        let attributes = jar.access_attributes().unwrap();
        assert!(attributes.http_only);
        assert!(attributes.secure);
        assert_eq!(attributes.same_site, SameSite::Lax);
        assert_eq!(attributes.path, "/");
        assert_eq!(attributes.max_age, Some(ACCESS_MAX_AGE));
        assert_eq!(jar.bearer().map(|b| b.expose_secret().to_owned()), Some("tok".to_string()));
    }

    #[test]
    fn test_clear_drops_both_cookies() {
        let jar = CredentialJar::new(false);
        jar.store_access(SecretString::from("a".to_string()));
        jar.store_refresh(SecretString::from("r".to_string()));
        jar.clear();
        assert!(!jar.has_credentials());
        assert!(jar.cookie_header().is_none());
    }

    #[test]
    fn test_debug_redacts_values() {
        let jar = CredentialJar::new(false);
        jar.store_access(SecretString::from("super-secret-token".to_string()));
        let debug = format!("{jar:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("super-secret-token"));
    }
}
