//! Shared session state.
//!
//! [`SessionCell`] is the single source of truth for "is a session active".
//! It is created once at startup and shared by reference; only the session
//! store and the authenticated request path write to it.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::watch;
use tracing::{debug, info};

use crate::models::User;
use crate::transport::Gateway;

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The user logged out.
    Logout,
    /// The refresh exchange failed, or the refreshed credential was rejected.
    RefreshFailed,
    /// The account was deleted.
    AccountDeleted,
}

/// Something holding per-session data that must be dropped when the
/// session ends.
pub trait SessionBound: Send + Sync {
    fn on_session_end(&self);
}

/// Identity plus the hooks that run when a session ends.
pub struct SessionCell {
    identity: watch::Sender<Option<User>>,
    gateway: Arc<Gateway>,
    bound: Mutex<Vec<Weak<dyn SessionBound>>>,
}

impl std::fmt::Debug for SessionCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCell")
            .field("identity", &*self.identity.borrow())
            .finish_non_exhaustive()
    }
}

impl SessionCell {
    #[must_use]
    pub fn new(gateway: Arc<Gateway>) -> Self {
        let (identity, _) = watch::channel(None);
        Self {
            identity,
            gateway,
            bound: Mutex::new(Vec::new()),
        }
    }

    /// The current identity, if a session is active.
    #[must_use]
    pub fn identity(&self) -> Option<User> {
        self.identity.borrow().clone()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.identity.borrow().is_some()
    }

    /// Receive a notification on every identity change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<User>> {
        self.identity.subscribe()
    }

    #[must_use]
    pub const fn gateway(&self) -> &Arc<Gateway> {
        &self.gateway
    }

    /// Register a store to be cleared when the session ends.
    pub fn register(&self, bound: Weak<dyn SessionBound>) {
        let mut hooks = self.bound.lock().unwrap_or_else(PoisonError::into_inner);
        hooks.retain(|hook| hook.strong_count() > 0);
        hooks.push(bound);
    }

    /// Publish a probed identity.
    ///
    /// Registered stores are cleared when the identity is lost or switches
    /// to a different user; re-probing the same user keeps them.
    pub(crate) fn set_identity(&self, user: Option<User>) {
        let next_id = user.as_ref().map(|u| u.id.clone());
        let previous = self.identity.send_replace(user);
        let Some(previous) = previous else {
            return;
        };
        match next_id {
            Some(id) if id == previous.id => {}
            Some(id) => {
                info!(from = %previous.id, to = %id, "Session switched user");
                self.clear_bound();
            }
            None => {
                debug!(user_id = %previous.id, "Identity lost");
                self.clear_bound();
            }
        }
    }

    /// End the session: drop both credentials, clear the identity, and
    /// clear every registered store.
    ///
    /// Idempotent.
    pub(crate) fn end(&self, reason: SessionEnd) {
        self.gateway.jar().clear();
        let previous = self.identity.send_replace(None);
        if previous.is_some() {
            info!(?reason, "Session ended");
        }
        self.clear_bound();
    }

    fn clear_bound(&self) {
        let hooks: Vec<Arc<dyn SessionBound>> = self
            .bound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(Weak::upgrade)
            .collect();
        for hook in hooks {
            hook.on_session_end();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::transport::{ApiRequest, ApiResponse, CredentialJar, Transport, TransportError};

    struct Offline;

    #[async_trait]
    impl Transport for Offline {
        async fn send(&self, _request: ApiRequest) -> Result<ApiResponse, TransportError> {
            Err(TransportError::Connect("offline".to_string()))
        }
    }

    #[derive(Default)]
    struct Counter(AtomicUsize);

    impl SessionBound for Counter {
        fn on_session_end(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn cell_with_counter() -> (SessionCell, Arc<Counter>) {
        let gateway = Arc::new(Gateway::new(Arc::new(Offline), CredentialJar::new(false)));
        let cell = SessionCell::new(gateway);
        let counter = Arc::new(Counter::default());
        let weak: Weak<dyn SessionBound> = Arc::downgrade(&counter) as Weak<dyn SessionBound>;
        cell.register(weak);
        (cell, counter)
    }

    fn resets(counter: &Counter) -> usize {
        counter.0.load(Ordering::SeqCst)
    }

    #[test]
    fn test_same_user_reprobe_keeps_stores() {
        let (cell, counter) = cell_with_counter();
        cell.set_identity(Some(User::new("u-1", "Mona")));
        cell.set_identity(Some(User::new("u-1", "Mona A.")));
        assert_eq!(resets(&counter), 0);
    }

    #[test]
    fn test_user_switch_and_lost_identity_clear_stores() {
        let (cell, counter) = cell_with_counter();
        cell.set_identity(Some(User::new("u-1", "Mona")));
        cell.set_identity(Some(User::new("u-2", "Omar")));
        assert_eq!(resets(&counter), 1);

        cell.set_identity(None);
        assert_eq!(resets(&counter), 2);

        cell.set_identity(None);
        assert_eq!(resets(&counter), 2);
    }

    #[test]
    fn test_end_runs_hooks_and_clears_jar() {
        let (cell, counter) = cell_with_counter();
        cell.gateway().jar().store_refresh(secrecy::SecretString::from("r".to_string()));
        cell.end(SessionEnd::Logout);
        assert_eq!(resets(&counter), 1);
        assert!(!cell.gateway().jar().has_credentials());
    }
}
