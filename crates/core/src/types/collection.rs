//! Client-held resource collections (cart, favorites).
//!
//! A [`ResourceCollection`] pairs the ordered item list with a cheaper
//! [`Summary`] projection. How much of it can be trusted depends on the
//! [`LoadMode`]:
//!
//! - [`LoadMode::Full`]: `summary` is derived from `items`, so
//!   `summary.count == items.len()` and `summary.total_amount` is the sum of
//!   line totals.
//! - [`LoadMode::Light`]: only `summary` is authoritative; `items` may be
//!   stale or empty.
//! - [`LoadMode::Unloaded`]: nothing has been fetched yet.
//!
//! All mutation helpers here are synchronous and pure; the optimistic store
//! calls them to apply a change locally before the server has answered.

use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::item::{CartItem, CollectionItem, Quantity};
use super::price::Price;

/// Cheap projection of a collection: how many entries and what they cost.
///
/// Missing fields on the wire decode as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    #[serde(default)]
    pub count: u32,
    #[serde(default, alias = "total")]
    pub total_amount: Price,
}

impl Summary {
    /// Summary derived from a complete item list.
    #[must_use]
    pub fn of<I: CollectionItem>(items: &[I]) -> Self {
        Self {
            count: u32::try_from(items.len()).unwrap_or(u32::MAX),
            total_amount: items.iter().map(CollectionItem::line_total).sum(),
        }
    }
}

/// How much of a collection has been loaded from the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum LoadMode {
    #[default]
    Unloaded,
    Light,
    Full,
}

/// An ordered, product-keyed collection plus its summary.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceCollection<I> {
    items: Vec<I>,
    summary: Summary,
    mode: LoadMode,
}

impl<I> Default for ResourceCollection<I> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            summary: Summary::default(),
            mode: LoadMode::Unloaded,
        }
    }
}

impl<I: CollectionItem> ResourceCollection<I> {
    /// A full collection built from a server item list.
    #[must_use]
    pub fn full(items: Vec<I>) -> Self {
        let mut collection = Self::default();
        collection.apply_full(items);
        collection
    }

    /// Items in display order.
    #[must_use]
    pub fn items(&self) -> &[I] {
        &self.items
    }

    #[must_use]
    pub const fn summary(&self) -> Summary {
        self.summary
    }

    #[must_use]
    pub const fn mode(&self) -> LoadMode {
        self.mode
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.summary.count == 0 && self.items.is_empty()
    }

    /// Whether an item with this product id is held locally.
    #[must_use]
    pub fn contains(&self, product_id: &ProductId) -> bool {
        self.get(product_id).is_some()
    }

    #[must_use]
    pub fn get(&self, product_id: &ProductId) -> Option<&I> {
        self.items.iter().find(|item| item.product_id() == product_id)
    }

    /// Replace everything with a full server view.
    ///
    /// Duplicate product ids keep their first occurrence, and the summary is
    /// recomputed from the items so the full-mode invariant always holds.
    pub fn apply_full(&mut self, items: Vec<I>) {
        let mut unique: Vec<I> = Vec::with_capacity(items.len());
        for item in items {
            if !unique.iter().any(|kept| kept.product_id() == item.product_id()) {
                unique.push(item);
            }
        }
        self.summary = Summary::of(&unique);
        self.items = unique;
        self.mode = LoadMode::Full;
    }

    /// Overwrite only the summary; items are left as they were.
    pub fn apply_light(&mut self, summary: Summary) {
        self.summary = summary;
        self.mode = LoadMode::Light;
    }

    /// Append an item unless its product id is already present.
    ///
    /// Returns `false` (and changes nothing) for a duplicate.
    pub fn insert(&mut self, item: I) -> bool {
        if self.contains(item.product_id()) {
            return false;
        }
        self.summary.count = self.summary.count.saturating_add(1);
        self.summary.total_amount += item.line_total();
        self.items.push(item);
        true
    }

    /// Remove an item by product id, adjusting the summary.
    ///
    /// In light mode the item may exist on the server without being held
    /// locally; the count is still decremented in that case.
    pub fn remove(&mut self, product_id: &ProductId) -> Option<I> {
        let position = self.items.iter().position(|item| item.product_id() == product_id);
        match position {
            Some(index) => {
                let removed = self.items.remove(index);
                self.summary.count = self.summary.count.saturating_sub(1);
                self.summary.total_amount = self.summary.total_amount.saturating_sub(removed.line_total());
                Some(removed)
            }
            None => {
                if self.mode == LoadMode::Light {
                    self.summary.count = self.summary.count.saturating_sub(1);
                }
                None
            }
        }
    }

    /// Swap a held item for the server's authoritative record.
    ///
    /// Does nothing when the item is no longer held (a later mutation removed
    /// it), so a late confirmation never resurrects an entry.
    pub fn replace(&mut self, record: I) -> bool {
        let Some(slot) = self
            .items
            .iter_mut()
            .find(|item| item.product_id() == record.product_id())
        else {
            return false;
        };
        let previous = slot.line_total();
        let next = record.line_total();
        *slot = record;
        self.summary.total_amount = self.summary.total_amount.saturating_sub(previous) + next;
        true
    }

    /// Empty the collection; the load mode is kept.
    pub fn clear(&mut self) {
        self.items.clear();
        self.summary = Summary::default();
    }
}

impl ResourceCollection<CartItem> {
    /// Change the quantity of a held cart line.
    ///
    /// Returns the previous quantity, or `None` if the line is not held.
    pub fn set_quantity(&mut self, product_id: &ProductId, quantity: Quantity) -> Option<Quantity> {
        let slot = self
            .items
            .iter_mut()
            .find(|item| &item.product_id == product_id)?;
        let previous = slot.quantity;
        let old_total = slot.line_total();
        slot.quantity = quantity;
        let new_total = slot.line_total();
        self.summary.total_amount = self.summary.total_amount.saturating_sub(old_total) + new_total;
        Some(previous)
    }
}
