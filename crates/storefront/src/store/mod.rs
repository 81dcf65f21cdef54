//! Optimistic client-held collections.
//!
//! Every mutation walks the same state machine:
//!
//! ```text
//! Idle ──apply──▶ OptimisticApplied ──commit──▶ Committed
//!                        │
//!                        └──roll_back──▶ RolledBack
//! ```
//!
//! The local change lands immediately; the pre-mutation snapshot is kept
//! until the remote call settles. On failure the snapshot is restored
//! whole. Concurrent mutations are not serialized; whichever settles last
//! wins.

mod pending;

pub use pending::{MutationKind, MutationPhase, PendingMutation};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, instrument};

use giftshop_core::{
    CartItem, CollectionItem, LoadMode, ProductId, ProductSnapshot, Quantity,
    ResourceCollection, Summary,
};

use crate::error::{ApiError, ValidationError};
use crate::resources::{Cart, Favorites, MutationReceipt, Resource, ResourceClient};
use crate::session::{SessionBound, SessionCell};

/// Client-held copy of one remote collection.
pub struct OptimisticStore<R: Resource> {
    client: ResourceClient<R>,
    session: Arc<SessionCell>,
    state: watch::Sender<ResourceCollection<R::Item>>,
    next_mutation: AtomicU64,
}

/// The cart store.
pub type CartStore = OptimisticStore<Cart>;
/// The favorites store.
pub type FavoritesStore = OptimisticStore<Favorites>;

impl<R: Resource> std::fmt::Debug for OptimisticStore<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptimisticStore")
            .field("resource", &R::NAME)
            .field("summary", &self.summary())
            .field("mode", &self.mode())
            .finish_non_exhaustive()
    }
}

impl<R: Resource> SessionBound for OptimisticStore<R> {
    fn on_session_end(&self) {
        self.state.send_replace(ResourceCollection::default());
        debug!(resource = R::NAME, "Store cleared");
    }
}

impl<R: Resource> OptimisticStore<R> {
    /// Create the store and register it to be cleared when the session ends.
    #[must_use]
    pub fn new(client: ResourceClient<R>, session: Arc<SessionCell>) -> Arc<Self> {
        let (state, _) = watch::channel(ResourceCollection::default());
        let store = Arc::new(Self {
            client,
            session: Arc::clone(&session),
            state,
            next_mutation: AtomicU64::new(1),
        });
        let hook: Weak<dyn SessionBound> = Arc::downgrade(&store) as Weak<dyn SessionBound>;
        session.register(hook);
        store
    }

    // =========================================================================
    // State
    // =========================================================================

    /// Copy of the current collection.
    #[must_use]
    pub fn snapshot(&self) -> ResourceCollection<R::Item> {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn summary(&self) -> Summary {
        self.state.borrow().summary()
    }

    #[must_use]
    pub fn mode(&self) -> LoadMode {
        self.state.borrow().mode()
    }

    #[must_use]
    pub fn contains(&self, product_id: &ProductId) -> bool {
        self.state.borrow().contains(product_id)
    }

    /// Receive a notification on every change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ResourceCollection<R::Item>> {
        self.state.subscribe()
    }

    #[must_use]
    pub const fn client(&self) -> &ResourceClient<R> {
        &self.client
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Refresh the summary. Items are left as they are.
    ///
    /// On failure the held state is kept.
    pub async fn fetch_light(&self) -> Summary {
        if !self.session.is_active() {
            return self.summary();
        }
        if let Ok(summary) = self.client.try_fetch_light().await {
            if self.session.is_active() {
                self.state.send_modify(|collection| collection.apply_light(summary));
            }
        }
        self.summary()
    }

    /// Replace the held collection with the server's full view.
    ///
    /// On failure the held state is kept.
    pub async fn fetch_full(&self) -> ResourceCollection<R::Item> {
        if !self.session.is_active() {
            return self.snapshot();
        }
        if let Ok(full) = self.client.try_fetch_full().await {
            if self.session.is_active() {
                self.state.send_replace(full);
            }
        }
        self.snapshot()
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add a product, showing a placeholder until the server confirms.
    ///
    /// Adding a product already held changes nothing locally, but the
    /// request is still sent.
    ///
    /// # Errors
    ///
    /// `ApiError::Unauthenticated` without a session (nothing is sent or
    /// changed); otherwise the request failure, after rolling back.
    #[instrument(skip(self, product), fields(resource = R::NAME, product_id = %product.product_id))]
    pub async fn add(
        &self,
        product: &ProductSnapshot,
        quantity: Option<Quantity>,
    ) -> Result<(), ApiError> {
        self.ensure_session()?;
        let quantity = quantity.unwrap_or(Quantity::ONE);

        let mut pending = self.begin(MutationKind::Add(product.product_id.clone()));
        let placeholder = R::Item::placeholder(product, quantity, Utc::now());
        pending.apply(&self.state, |collection| collection.insert(placeholder));

        let result = self.client.add(&product.product_id, Some(quantity)).await;
        self.settle(pending, result)
    }

    /// Remove a product.
    ///
    /// # Errors
    ///
    /// Same as [`add`](Self::add).
    #[instrument(skip(self), fields(resource = R::NAME, product_id = %product_id))]
    pub async fn remove(&self, product_id: &ProductId) -> Result<(), ApiError> {
        self.ensure_session()?;

        let mut pending = self.begin(MutationKind::Remove(product_id.clone()));
        pending.apply(&self.state, |collection| {
            let held = collection.contains(product_id);
            let count = collection.summary().count;
            collection.remove(product_id);
            held || collection.summary().count != count
        });

        let result = self.client.remove(product_id).await;
        self.settle(pending, result)
    }

    /// Remove everything.
    ///
    /// # Errors
    ///
    /// Same as [`add`](Self::add).
    #[instrument(skip(self), fields(resource = R::NAME))]
    pub async fn clear(&self) -> Result<(), ApiError> {
        self.ensure_session()?;

        let mut pending = self.begin(MutationKind::Clear);
        pending.apply(&self.state, |collection| {
            let changed = !collection.is_empty();
            collection.clear();
            changed
        });

        let result = self.client.clear().await;
        self.settle(pending, result)
    }

    fn ensure_session(&self) -> Result<(), ApiError> {
        if self.session.is_active() {
            Ok(())
        } else {
            debug!(resource = R::NAME, "Mutation refused without a session");
            Err(ApiError::Unauthenticated)
        }
    }

    fn begin(&self, kind: MutationKind) -> PendingMutation<R::Item> {
        PendingMutation::new(self.next_mutation.fetch_add(1, Ordering::Relaxed), kind)
    }

    /// Commit or roll back once the remote call has settled.
    fn settle(
        &self,
        pending: PendingMutation<R::Item>,
        result: Result<MutationReceipt<R::Item>, ApiError>,
    ) -> Result<(), ApiError> {
        match result {
            Ok(receipt) => {
                let session_active = self.session.is_active();
                pending.commit(&self.state, |collection| {
                    if session_active {
                        reconcile(collection, receipt)
                    } else {
                        false
                    }
                });
                Ok(())
            }
            Err(e) => {
                pending.roll_back(&self.state, self.session.is_active(), &e);
                Err(e)
            }
        }
    }
}

/// Merge a server receipt into the held collection.
///
/// The authoritative record replaces the placeholder. A reported summary is
/// taken only when items are not fully loaded, since in full mode the
/// summary is derived from the items.
fn reconcile<I: CollectionItem>(
    collection: &mut ResourceCollection<I>,
    receipt: MutationReceipt<I>,
) -> bool {
    let summary = receipt.summary();
    let mut changed = receipt.item.is_some_and(|record| collection.replace(record));
    if let Some(summary) = summary {
        if collection.mode() != LoadMode::Full && collection.summary() != summary {
            collection.apply_light(summary);
            changed = true;
        }
    }
    changed
}

impl OptimisticStore<Cart> {
    /// Set a line's quantity.
    ///
    /// # Errors
    ///
    /// `ApiError::ValidationRejected` for a quantity below one; otherwise as
    /// [`add`](Self::add).
    #[instrument(skip(self), fields(resource = Cart::NAME, product_id = %product_id))]
    pub async fn update(&self, product_id: &ProductId, quantity: u32) -> Result<(), ApiError> {
        self.ensure_session()?;
        let quantity = Quantity::new(quantity).map_err(ValidationError::from)?;

        let mut pending = self.begin(MutationKind::Update(product_id.clone(), quantity));
        pending.apply(&self.state, |collection| {
            collection
                .set_quantity(product_id, quantity)
                .is_some_and(|previous| previous != quantity)
        });

        let result = self.client.update(product_id, quantity.get()).await;
        self.settle(pending, result)
    }

    /// Take one off a line; the last one removes the line.
    ///
    /// Does nothing for a line that is not held.
    ///
    /// # Errors
    ///
    /// As [`update`](Self::update) or [`remove`](Self::remove).
    pub async fn decrement(&self, product_id: &ProductId) -> Result<(), ApiError> {
        let current = self
            .state
            .borrow()
            .get(product_id)
            .map(|line: &CartItem| line.quantity.get());
        match current {
            None => Ok(()),
            Some(1) => self.remove(product_id).await,
            Some(quantity) => self.update(product_id, quantity - 1).await,
        }
    }
}

impl OptimisticStore<Favorites> {
    /// Add the product if absent, remove it if present.
    ///
    /// Returns whether the product is a favorite afterwards.
    ///
    /// # Errors
    ///
    /// As [`add`](Self::add) or [`remove`](Self::remove).
    pub async fn toggle(&self, product: &ProductSnapshot) -> Result<bool, ApiError> {
        if self.contains(&product.product_id) {
            self.remove(&product.product_id).await?;
            Ok(false)
        } else {
            self.add(product, None).await?;
            Ok(true)
        }
    }
}
