//! Single-flight credential refresh.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use reqwest::Method;
use tracing::{debug, info, warn};

use crate::transport::{Gateway, TransportError};

/// Path of the refresh exchange.
pub const REFRESH_PATH: &str = "/api/auth/refresh-token";

/// Result of a refresh exchange, shared by every caller that joined it.
#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    /// The server issued a new access credential.
    Refreshed,
    /// The server refused; the session is over.
    Rejected,
    /// The exchange never produced a status.
    Unreachable(TransportError),
}

type InFlight = Shared<BoxFuture<'static, RefreshOutcome>>;

/// Coalesces concurrent refresh requests.
///
/// At most one exchange is in flight. Callers arriving while one is running
/// await the same result instead of starting their own.
pub struct TokenRefresher {
    gateway: Arc<Gateway>,
    in_flight: Mutex<Option<InFlight>>,
    exchanges: AtomicU64,
}

impl std::fmt::Debug for TokenRefresher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRefresher")
            .field("exchanges", &self.exchange_count())
            .finish_non_exhaustive()
    }
}

impl TokenRefresher {
    #[must_use]
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self {
            gateway,
            in_flight: Mutex::new(None),
            exchanges: AtomicU64::new(0),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<InFlight>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of refresh exchanges actually sent.
    #[must_use]
    pub fn exchange_count(&self) -> u64 {
        self.exchanges.load(Ordering::Relaxed)
    }

    /// Obtain a fresh access credential, joining any exchange in flight.
    ///
    /// `seen_epoch` is the jar epoch the caller's rejected request was sent
    /// with. If the access credential has rotated since then, another caller
    /// already refreshed and no exchange is started.
    pub async fn refresh_once(&self, seen_epoch: u64) -> RefreshOutcome {
        let shared = {
            let mut slot = self.slot();
            if let Some(in_flight) = slot.as_ref() {
                debug!("Joining in-flight refresh");
                in_flight.clone()
            } else if self.gateway.jar().epoch() != seen_epoch && self.gateway.jar().has_access() {
                debug!("Access credential already rotated");
                return RefreshOutcome::Refreshed;
            } else if !self.gateway.jar().has_credentials() {
                debug!("No credential left to refresh with");
                return RefreshOutcome::Rejected;
            } else {
                self.exchanges.fetch_add(1, Ordering::Relaxed);
                let exchange = exchange(Arc::clone(&self.gateway)).boxed().shared();
                *slot = Some(exchange.clone());
                exchange
            }
        };

        let outcome = shared.clone().await;

        let mut slot = self.slot();
        if slot.as_ref().is_some_and(|current| current.ptr_eq(&shared)) {
            *slot = None;
        }
        outcome
    }
}

async fn exchange(gateway: Arc<Gateway>) -> RefreshOutcome {
    match gateway.send(Method::POST, REFRESH_PATH, None, false).await {
        Ok(response) if response.is_success() => {
            info!("Access credential refreshed");
            RefreshOutcome::Refreshed
        }
        Ok(response) => {
            warn!(status = %response.status, "Refresh rejected");
            RefreshOutcome::Rejected
        }
        Err(e) => {
            warn!(error = %e, "Refresh exchange failed");
            RefreshOutcome::Unreachable(e)
        }
    }
}
