//! HTTP transport boundary.
//!
//! # Architecture
//!
//! - [`Transport`] sends one request and returns the raw response. The
//!   production implementation is [`HttpTransport`] (`reqwest`); tests plug
//!   in a scripted backend.
//! - [`CredentialJar`] holds the credential cookies.
//! - [`Gateway`] ties the two together: it replays cookies (and the bearer
//!   credential when asked) on the way out and absorbs `Set-Cookie` headers
//!   on the way back, for every response including failures.
//!
//! Nothing above this module reads a credential value.

mod cookies;
mod http;

pub use cookies::{
    ACCESS_COOKIE, ACCESS_MAX_AGE, CookieAttributes, CredentialJar, REFRESH_COOKIE,
    REFRESH_MAX_AGE, SameSite,
};
pub use http::HttpTransport;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use secrecy::SecretString;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Errors raised below HTTP semantics: the request never produced a status.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The request timed out.
    #[error("request timed out")]
    Timeout,

    /// The server could not be reached (DNS, refused, offline).
    #[error("connection failed: {0}")]
    Connect(String),

    /// Any other HTTP client failure.
    #[error("HTTP error: {0}")]
    Http(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if error.is_connect() {
            Self::Connect(error.to_string())
        } else {
            Self::Http(error.to_string())
        }
    }
}

/// An outgoing API request as seen by a [`Transport`].
#[derive(Debug)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the API base URL, e.g. `/api/cart/count`.
    pub path: String,
    pub body: Option<serde_json::Value>,
    /// Value for `Authorization: Bearer <credential>`.
    pub bearer: Option<SecretString>,
    /// Value for the `Cookie` header.
    pub cookie: Option<SecretString>,
}

/// A raw API response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    /// Every `Set-Cookie` header value, in order.
    pub set_cookies: Vec<String>,
    pub body: String,
}

impl ApiResponse {
    /// Build a response with a body and no cookies.
    #[must_use]
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            set_cookies: Vec::new(),
            body: body.into(),
        }
    }

    /// Build a JSON response.
    #[must_use]
    pub fn json_body(status: StatusCode, body: &serde_json::Value) -> Self {
        Self::new(status, body.to_string())
    }

    /// Add a `Set-Cookie` header.
    #[must_use]
    pub fn with_set_cookie(mut self, header: impl Into<String>) -> Self {
        self.set_cookies.push(header.into());
        self
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Decode the body as JSON.
    ///
    /// An empty body decodes as JSON `null`, so `Option`/defaulted targets
    /// accept `204 No Content`.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error when the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        if self.body.trim().is_empty() {
            serde_json::from_value(serde_json::Value::Null)
        } else {
            serde_json::from_str(&self.body)
        }
    }

    /// Human-readable failure message from an error body.
    ///
    /// Looks for `message` then `error`; falls back to the status reason.
    #[must_use]
    pub fn error_message(&self) -> String {
        let from_body = serde_json::from_str::<serde_json::Value>(&self.body)
            .ok()
            .and_then(|value| {
                ["message", "error"].iter().find_map(|key| {
                    value
                        .get(*key)
                        .and_then(serde_json::Value::as_str)
                        .map(str::to_owned)
                })
            });

        from_body.unwrap_or_else(|| {
            self.status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        })
    }
}

/// Sends a single request to the backend.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send the request and return whatever the server answered.
    ///
    /// Non-2xx statuses are responses, not errors.
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError>;
}

/// Transport plus credential jar.
pub struct Gateway {
    transport: Arc<dyn Transport>,
    jar: CredentialJar,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway").field("jar", &self.jar).finish_non_exhaustive()
    }
}

impl Gateway {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, jar: CredentialJar) -> Self {
        Self { transport, jar }
    }

    #[must_use]
    pub const fn jar(&self) -> &CredentialJar {
        &self.jar
    }

    /// Send a request with the jar's cookies attached.
    ///
    /// `with_bearer` additionally attaches the access credential as an
    /// `Authorization: Bearer` header.
    pub(crate) async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
        with_bearer: bool,
    ) -> Result<ApiResponse, TransportError> {
        let request = ApiRequest {
            method,
            path: path.to_owned(),
            body: body.cloned(),
            bearer: if with_bearer { self.jar.bearer() } else { None },
            cookie: self.jar.cookie_header(),
        };

        let response = self.transport.send(request).await?;
        self.jar.absorb(&response.set_cookies);
        Ok(response)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn test_error_message_prefers_body() {
        let response = ApiResponse::new(StatusCode::CONFLICT, r#"{"message":"Out of stock"}"#);
        assert_eq!(response.error_message(), "Out of stock");

        let response = ApiResponse::new(StatusCode::BAD_REQUEST, r#"{"error":"Bad quantity"}"#);
        assert_eq!(response.error_message(), "Bad quantity");

        let response = ApiResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "<html>oops</html>");
        assert_eq!(response.error_message(), "Internal Server Error");
    }

    #[test]
    fn test_empty_body_decodes_as_null() {
        let response = ApiResponse::new(StatusCode::NO_CONTENT, "");
        let decoded: Option<serde_json::Value> = response.json().unwrap();
        assert!(decoded.is_none());
    }

    struct EchoTransport {
        seen: Mutex<Vec<(Option<String>, Option<String>)>>,
    }

    #[async_trait]
    impl Transport for EchoTransport {
        async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
            self.seen.lock().unwrap().push((
                request.bearer.map(|b| b.expose_secret().to_owned()),
                request.cookie.map(|c| c.expose_secret().to_owned()),
            ));
            Ok(ApiResponse::new(StatusCode::OK, "{}")
                .with_set_cookie("access_token=rotated; HttpOnly; Path=/"))
        }
    }

    #[tokio::test]
    async fn test_gateway_attaches_and_absorbs_cookies() {
        let transport = Arc::new(EchoTransport {
            seen: Mutex::new(Vec::new()),
        });
        let jar = CredentialJar::new(false);
        jar.store_access(SecretString::from("original".to_string()));
        let gateway = Gateway::new(transport.clone(), jar);

        gateway.send(Method::GET, "/api/cart", None, true).await.unwrap();
        gateway.send(Method::GET, "/api/cart", None, false).await.unwrap();

        let seen = transport.seen.lock().unwrap().clone();
        assert_eq!(seen[0].0.as_deref(), Some("original"));
        assert_eq!(seen[0].1.as_deref(), Some("access_token=original"));
        assert_eq!(seen[1].0, None);
        assert_eq!(seen[1].1.as_deref(), Some("access_token=rotated"));
    }
}
