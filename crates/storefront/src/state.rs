//! Client state shared across consumers.

use std::sync::Arc;

use tracing::{debug, info};

use crate::account::AccountService;
use crate::auth::ApiClient;
use crate::config::StorefrontConfig;
use crate::error::ApiError;
use crate::resources::ResourceClient;
use crate::session::{SessionCell, SessionStore};
use crate::store::{CartStore, FavoritesStore, OptimisticStore};
use crate::transport::{CredentialJar, Gateway, HttpTransport, Transport};

/// Everything a consumer needs, constructed once at startup.
///
/// This struct is cheaply cloneable via `Arc`; clones share the session and
/// both stores.
#[derive(Debug, Clone)]
pub struct Storefront {
    inner: Arc<StorefrontInner>,
}

#[derive(Debug)]
struct StorefrontInner {
    config: StorefrontConfig,
    api: Arc<ApiClient>,
    session: SessionStore,
    cart: Arc<CartStore>,
    favorites: Arc<FavoritesStore>,
    account: AccountService,
}

impl Storefront {
    /// Build from environment configuration over HTTP.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Config` if `GIFTSHOP_API_BASE_URL` is missing or
    /// invalid, or `ApiError::Network` if the HTTP client cannot be built.
    pub fn from_env() -> Result<Self, ApiError> {
        Self::new(StorefrontConfig::from_env()?)
    }

    /// Build over HTTP.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Network` if the HTTP client cannot be built.
    pub fn new(config: StorefrontConfig) -> Result<Self, ApiError> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Build over any transport.
    #[must_use]
    pub fn with_transport(config: StorefrontConfig, transport: Arc<dyn Transport>) -> Self {
        let jar = CredentialJar::new(config.environment.secure_cookies());
        let gateway = Arc::new(Gateway::new(transport, jar));
        let cell = Arc::new(SessionCell::new(gateway));
        let api = Arc::new(ApiClient::new(Arc::clone(&cell)));

        let session = SessionStore::new(Arc::clone(&api));
        let cart = OptimisticStore::new(ResourceClient::new(Arc::clone(&api)), Arc::clone(&cell));
        let favorites = OptimisticStore::new(ResourceClient::new(Arc::clone(&api)), cell);
        let account = AccountService::new(Arc::clone(&api), session.clone());

        debug!(base_url = %config.api_base_url, environment = ?config.environment, "Storefront client built");

        Self {
            inner: Arc::new(StorefrontInner {
                config,
                api,
                session,
                cart,
                favorites,
                account,
            }),
        }
    }

    /// Probe the session and, if one is active, load both badge counts.
    pub async fn bootstrap(&self) -> bool {
        if self.inner.session.check_status().await.is_none() {
            return false;
        }
        let (cart, favorites) = tokio::join!(
            self.inner.cart.fetch_light(),
            self.inner.favorites.fetch_light()
        );
        info!(cart = cart.count, favorites = favorites.count, "Session restored");
        true
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn session(&self) -> &SessionStore {
        &self.inner.session
    }

    #[must_use]
    pub fn cart(&self) -> &Arc<CartStore> {
        &self.inner.cart
    }

    #[must_use]
    pub fn favorites(&self) -> &Arc<FavoritesStore> {
        &self.inner.favorites
    }

    #[must_use]
    pub fn account(&self) -> &AccountService {
        &self.inner.account
    }

    /// The request executor, for calls not covered by a typed client.
    #[must_use]
    pub fn api(&self) -> &Arc<ApiClient> {
        &self.inner.api
    }
}
