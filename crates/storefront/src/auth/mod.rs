//! Authenticated request execution.
//!
//! Every authenticated call goes through [`ApiClient::execute`]:
//!
//! 1. Refuse immediately if no credential is held.
//! 2. Send with the access credential attached.
//! 3. On `401`, obtain a fresh credential through the [`TokenRefresher`]
//!    (joining any refresh already in flight) and retry exactly once.
//! 4. A failed refresh, or a `401` on the retry, ends the session.

mod refresh;

pub use refresh::{REFRESH_PATH, RefreshOutcome, TokenRefresher};

use std::sync::Arc;

use reqwest::{Method, StatusCode};
use tracing::{debug, instrument, warn};

use crate::error::ApiError;
use crate::session::{SessionCell, SessionEnd};
use crate::transport::{ApiResponse, Gateway};

/// Describes one API call.
#[derive(Debug, Clone)]
pub struct AuthenticatedRequest {
    method: Method,
    path: String,
    body: Option<serde_json::Value>,
    requires_auth: bool,
}

impl AuthenticatedRequest {
    /// An authenticated call.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            requires_auth: true,
        }
    }

    /// A call that needs no credential. Cookies are still sent.
    #[must_use]
    pub fn public(method: Method, path: impl Into<String>) -> Self {
        Self {
            requires_auth: false,
            ..Self::new(method, path)
        }
    }

    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    #[must_use]
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body.
    #[must_use]
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub const fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }

    #[must_use]
    pub const fn requires_auth(&self) -> bool {
        self.requires_auth
    }
}

/// Executes API calls against the backend with refresh-and-retry.
pub struct ApiClient {
    gateway: Arc<Gateway>,
    refresher: TokenRefresher,
    session: Arc<SessionCell>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("refresher", &self.refresher)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    #[must_use]
    pub fn new(session: Arc<SessionCell>) -> Self {
        let gateway = Arc::clone(session.gateway());
        Self {
            refresher: TokenRefresher::new(Arc::clone(&gateway)),
            gateway,
            session,
        }
    }

    #[must_use]
    pub const fn session(&self) -> &Arc<SessionCell> {
        &self.session
    }

    #[must_use]
    pub const fn refresher(&self) -> &TokenRefresher {
        &self.refresher
    }

    /// Execute a call and return the successful response.
    ///
    /// # Errors
    ///
    /// - `ApiError::Unauthenticated` if auth is required and no credential
    ///   is held, the refresh fails, or the retried call is rejected again.
    /// - `ApiError::RequestFailed` for any other non-2xx status.
    /// - `ApiError::Network` if no status was received.
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    pub async fn execute(&self, request: &AuthenticatedRequest) -> Result<ApiResponse, ApiError> {
        if !request.requires_auth {
            let response = self.send(request, false).await?;
            return ensure_success(response);
        }

        if !self.gateway.jar().has_credentials() {
            debug!("No credential held");
            return Err(ApiError::Unauthenticated);
        }

        let epoch = self.gateway.jar().epoch();
        let response = self.send(request, true).await?;
        if response.status != StatusCode::UNAUTHORIZED {
            return ensure_success(response);
        }

        debug!("Access credential rejected, refreshing");
        match self.refresher.refresh_once(epoch).await {
            RefreshOutcome::Refreshed => {}
            RefreshOutcome::Rejected => {
                self.session.end(SessionEnd::RefreshFailed);
                return Err(ApiError::Unauthenticated);
            }
            RefreshOutcome::Unreachable(e) => return Err(ApiError::Network(e)),
        }

        let retried = self.send(request, true).await?;
        if retried.status == StatusCode::UNAUTHORIZED {
            warn!("Refreshed credential rejected");
            self.session.end(SessionEnd::RefreshFailed);
            return Err(ApiError::Unauthenticated);
        }
        ensure_success(retried)
    }

    async fn send(
        &self,
        request: &AuthenticatedRequest,
        with_bearer: bool,
    ) -> Result<ApiResponse, ApiError> {
        Ok(self
            .gateway
            .send(
                request.method.clone(),
                &request.path,
                request.body.as_ref(),
                with_bearer,
            )
            .await?)
    }
}

fn ensure_success(response: ApiResponse) -> Result<ApiResponse, ApiError> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(ApiError::RequestFailed {
            status: response.status,
            message: response.error_message(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use secrecy::SecretString;

    use super::*;
    use crate::models::User;
    use crate::transport::{ApiRequest, CredentialJar, Transport, TransportError};

    /// Replies from a fixed script and records every path.
    struct Script {
        replies: Mutex<VecDeque<ApiResponse>>,
        paths: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Transport for Script {
        async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
            self.paths.lock().unwrap().push(request.path);
            Ok(self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| ApiResponse::new(StatusCode::NOT_FOUND, "")))
        }
    }

    fn client(replies: Vec<ApiResponse>) -> (Arc<Script>, ApiClient) {
        let script = Arc::new(Script {
            replies: Mutex::new(replies.into()),
            paths: Mutex::new(Vec::new()),
        });
        let jar = CredentialJar::new(false);
        jar.store_access(SecretString::from("a1".to_string()));
        jar.store_refresh(SecretString::from("r1".to_string()));
        let session = Arc::new(SessionCell::new(Arc::new(Gateway::new(script.clone(), jar))));
        session.set_identity(Some(User::new("u1", "Mona")));
        (script, ApiClient::new(session))
    }

    fn unauthorized() -> ApiResponse {
        ApiResponse::new(StatusCode::UNAUTHORIZED, "")
    }

    fn refreshed() -> ApiResponse {
        ApiResponse::new(StatusCode::OK, "{}").with_set_cookie("access_token=a2; HttpOnly; Path=/")
    }

    #[tokio::test]
    async fn test_success_without_refresh() {
        let (script, api) = client(vec![ApiResponse::new(StatusCode::OK, r#"{"count":2}"#)]);
        let response = api.execute(&AuthenticatedRequest::get("/api/cart/count")).await.unwrap();
        assert_eq!(response.body, r#"{"count":2}"#);
        assert_eq!(script.paths.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_then_retry() {
        let (script, api) = client(vec![
            unauthorized(),
            refreshed(),
            ApiResponse::new(StatusCode::OK, "[]"),
        ]);
        api.execute(&AuthenticatedRequest::get("/api/cart")).await.unwrap();
        assert_eq!(
            *script.paths.lock().unwrap(),
            vec!["/api/cart", REFRESH_PATH, "/api/cart"]
        );
        assert!(api.session().is_active());
    }

    #[tokio::test]
    async fn test_second_unauthorized_is_terminal() {
        let (script, api) = client(vec![unauthorized(), refreshed(), unauthorized()]);
        let err = api.execute(&AuthenticatedRequest::get("/api/cart")).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthenticated));
        assert_eq!(script.paths.lock().unwrap().len(), 3);
        assert!(!api.session().is_active());
        assert!(!api.session().gateway().jar().has_credentials());
    }

    #[tokio::test]
    async fn test_failed_refresh_ends_session() {
        let (script, api) = client(vec![unauthorized(), unauthorized()]);
        let err = api.execute(&AuthenticatedRequest::get("/api/cart")).await.unwrap_err();
        assert!(err.requires_login());
        assert_eq!(script.paths.lock().unwrap().len(), 2);
        assert!(!api.session().is_active());
    }

    #[tokio::test]
    async fn test_missing_credential_short_circuits() {
        let (script, api) = client(vec![]);
        api.session().gateway().jar().clear();
        let err = api.execute(&AuthenticatedRequest::get("/api/cart")).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthenticated));
        assert!(script.paths.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_public_call_does_not_refresh() {
        let (script, api) = client(vec![unauthorized()]);
        let request = AuthenticatedRequest::public(Method::POST, "/api/auth/login");
        let err = api.execute(&request).await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
        assert_eq!(script.paths.lock().unwrap().len(), 1);
        assert!(api.session().is_active());
    }

    #[tokio::test]
    async fn test_non_auth_failure_surfaces_message() {
        let (_, api) = client(vec![ApiResponse::new(
            StatusCode::CONFLICT,
            r#"{"message":"Out of stock"}"#,
        )]);
        let err = api.execute(&AuthenticatedRequest::post("/api/cart/add")).await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::CONFLICT));
        assert_eq!(err.user_message(), "Out of stock");
    }
}
