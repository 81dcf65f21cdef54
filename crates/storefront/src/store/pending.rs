//! One in-flight optimistic mutation.

use tokio::sync::watch;
use tracing::{debug, warn};

use giftshop_core::{CollectionItem, ProductId, Quantity, ResourceCollection};

use crate::error::ApiError;

/// Where a mutation is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationPhase {
    Idle,
    OptimisticApplied,
    Committed,
    RolledBack,
}

impl MutationPhase {
    /// Whether the remote call has settled.
    #[must_use]
    pub const fn is_settled(self) -> bool {
        matches!(self, Self::Committed | Self::RolledBack)
    }
}

/// What a mutation does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationKind {
    Add(ProductId),
    Update(ProductId, Quantity),
    Remove(ProductId),
    Clear,
}

/// Snapshot and phase of a mutation whose remote call has not settled.
#[derive(Debug)]
pub struct PendingMutation<I> {
    id: u64,
    kind: MutationKind,
    snapshot: Option<ResourceCollection<I>>,
    phase: MutationPhase,
}

impl<I: CollectionItem> PendingMutation<I> {
    pub(crate) const fn new(id: u64, kind: MutationKind) -> Self {
        Self {
            id,
            kind,
            snapshot: None,
            phase: MutationPhase::Idle,
        }
    }

    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub const fn kind(&self) -> &MutationKind {
        &self.kind
    }

    #[must_use]
    pub const fn phase(&self) -> MutationPhase {
        self.phase
    }

    /// The collection as it was before the optimistic change.
    #[must_use]
    pub const fn snapshot(&self) -> Option<&ResourceCollection<I>> {
        self.snapshot.as_ref()
    }

    /// Capture the snapshot and apply the optimistic change in one step.
    ///
    /// `change` returns whether it modified the collection; subscribers are
    /// only notified if it did.
    pub(crate) fn apply<F>(&mut self, state: &watch::Sender<ResourceCollection<I>>, change: F)
    where
        F: FnOnce(&mut ResourceCollection<I>) -> bool,
    {
        debug_assert_eq!(self.phase, MutationPhase::Idle);
        let snapshot = &mut self.snapshot;
        state.send_if_modified(|collection| {
            *snapshot = Some(collection.clone());
            change(collection)
        });
        self.phase = MutationPhase::OptimisticApplied;
    }

    /// Merge the server's answer and discard the snapshot.
    pub(crate) fn commit<F>(
        mut self,
        state: &watch::Sender<ResourceCollection<I>>,
        merge: F,
    ) -> MutationPhase
    where
        F: FnOnce(&mut ResourceCollection<I>) -> bool,
    {
        debug_assert_eq!(self.phase, MutationPhase::OptimisticApplied);
        state.send_if_modified(merge);
        self.phase = MutationPhase::Committed;
        debug!(mutation = self.id, kind = ?self.kind, "Mutation committed");
        self.phase
    }

    /// Restore the snapshot verbatim.
    ///
    /// If the session is gone the collection is left empty instead.
    pub(crate) fn roll_back(
        mut self,
        state: &watch::Sender<ResourceCollection<I>>,
        session_active: bool,
        error: &ApiError,
    ) -> MutationPhase {
        debug_assert_eq!(self.phase, MutationPhase::OptimisticApplied);
        let restored = if session_active {
            self.snapshot.take().unwrap_or_default()
        } else {
            ResourceCollection::default()
        };
        state.send_replace(restored);
        self.phase = MutationPhase::RolledBack;
        warn!(mutation = self.id, kind = ?self.kind, error = %error, "Mutation rolled back");
        self.phase
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use giftshop_core::{CartItem, LocalizedName, Price, ProductSnapshot};

    use super::*;

    fn line(id: &str, units: i64) -> CartItem {
        let product = ProductSnapshot {
            product_id: ProductId::new(id),
            name: LocalizedName::new(id, id),
            price: Price::from_units(units),
            image: None,
        };
        CartItem::placeholder(&product, Quantity::ONE, chrono::Utc::now())
    }

    fn state_with(items: Vec<CartItem>) -> watch::Sender<ResourceCollection<CartItem>> {
        watch::channel(ResourceCollection::full(items)).0
    }

    #[test]
    fn test_apply_then_commit() {
        let state = state_with(vec![line("a", 10)]);
        let mut pending = PendingMutation::new(1, MutationKind::Add(ProductId::new("b")));
        assert_eq!(pending.phase(), MutationPhase::Idle);

        pending.apply(&state, |c| c.insert(line("b", 5)));
        assert_eq!(pending.phase(), MutationPhase::OptimisticApplied);
        assert_eq!(pending.snapshot().unwrap().items().len(), 1);
        assert_eq!(state.borrow().items().len(), 2);

        let phase = pending.commit(&state, |_| false);
        assert_eq!(phase, MutationPhase::Committed);
        assert!(phase.is_settled());
        assert_eq!(state.borrow().summary().total_amount, Price::from_units(15));
    }

    #[test]
    fn test_roll_back_restores_snapshot_exactly() {
        let state = state_with(vec![line("a", 10), line("b", 20)]);
        let before = state.borrow().clone();

        let mut pending = PendingMutation::new(2, MutationKind::Clear);
        pending.apply(&state, |c| {
            c.clear();
            true
        });
        assert!(state.borrow().is_empty());

        let error = ApiError::Unauthenticated;
        assert_eq!(pending.roll_back(&state, true, &error), MutationPhase::RolledBack);
        assert_eq!(*state.borrow(), before);
    }

    #[test]
    fn test_roll_back_after_session_end_stays_empty() {
        let state = state_with(vec![line("a", 10)]);
        let mut pending = PendingMutation::new(3, MutationKind::Remove(ProductId::new("a")));
        pending.apply(&state, |c| c.remove(&ProductId::new("a")).is_some());

        pending.roll_back(&state, false, &ApiError::Unauthenticated);
        assert_eq!(*state.borrow(), ResourceCollection::default());
    }

    #[tokio::test]
    async fn test_unchanged_apply_does_not_notify() {
        let state = state_with(vec![line("a", 10)]);
        let watcher = state.subscribe();

        let mut pending = PendingMutation::new(4, MutationKind::Add(ProductId::new("a")));
        pending.apply(&state, |c| c.insert(line("a", 10)));
        assert!(!watcher.has_changed().unwrap());
    }
}
