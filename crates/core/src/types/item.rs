//! Items held in client-side resource collections.
//!
//! Two item kinds exist: [`CartItem`] (carries a quantity) and
//! [`FavoriteItem`]. Both implement [`CollectionItem`], which is all the
//! collection arithmetic in [`crate::ResourceCollection`] needs.

use core::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::id::ProductId;
use super::price::Price;

/// Error returned when a quantity below one is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("quantity must be at least 1 (got {0})")]
pub struct QuantityError(pub u32);

/// A cart line quantity, always at least one.
///
/// A decrement to zero is a removal, which callers express by removing the
/// item instead of constructing a `Quantity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    /// A single unit.
    pub const ONE: Self = Self(1);

    /// Create a quantity.
    ///
    /// # Errors
    ///
    /// Returns [`QuantityError`] when `value` is zero.
    pub const fn new(value: u32) -> Result<Self, QuantityError> {
        if value < 1 {
            return Err(QuantityError(value));
        }
        Ok(Self(value))
    }

    /// Get the underlying count.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl Default for Quantity {
    fn default() -> Self {
        Self::ONE
    }
}

impl TryFrom<u32> for Quantity {
    type Error = QuantityError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for u32 {
    fn from(quantity: Quantity) -> Self {
        quantity.0
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bilingual display name as served by the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizedName {
    #[serde(rename = "nameEn", default)]
    pub en: String,
    #[serde(rename = "nameAr", default)]
    pub ar: String,
}

impl LocalizedName {
    /// Create a name from both translations.
    #[must_use]
    pub fn new(en: impl Into<String>, ar: impl Into<String>) -> Self {
        Self {
            en: en.into(),
            ar: ar.into(),
        }
    }

    /// Pick the translation for a language tag, falling back to English.
    #[must_use]
    pub fn for_language(&self, language: &str) -> &str {
        if language.starts_with("ar") && !self.ar.is_empty() {
            &self.ar
        } else {
            &self.en
        }
    }
}

/// What the presentation layer knows about a product when it asks for it
/// to be added to a collection.
///
/// Used to build the optimistic placeholder shown before the server answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSnapshot {
    pub product_id: ProductId,
    #[serde(flatten)]
    pub name: LocalizedName,
    pub price: Price,
    #[serde(default)]
    pub image: Option<String>,
}

/// Behaviour shared by everything stored in a resource collection.
pub trait CollectionItem: Clone + fmt::Debug + PartialEq + Send + Sync + 'static {
    /// Key of the item; unique within one collection.
    fn product_id(&self) -> &ProductId;

    /// Contribution of this item to the collection's `totalAmount`.
    fn line_total(&self) -> Price;

    /// Placeholder inserted optimistically before the server confirms.
    fn placeholder(product: &ProductSnapshot, quantity: Quantity, added_at: DateTime<Utc>) -> Self;
}

/// A line in the shopping cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: ProductId,
    #[serde(flatten)]
    pub name: LocalizedName,
    pub price: Price,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub quantity: Quantity,
    #[serde(default = "Utc::now")]
    pub date_added: DateTime<Utc>,
}

impl CollectionItem for CartItem {
    fn product_id(&self) -> &ProductId {
        &self.product_id
    }

    fn line_total(&self) -> Price {
        self.price.times(self.quantity.get())
    }

    fn placeholder(product: &ProductSnapshot, quantity: Quantity, added_at: DateTime<Utc>) -> Self {
        Self {
            product_id: product.product_id.clone(),
            name: product.name.clone(),
            price: product.price,
            image: product.image.clone(),
            quantity,
            date_added: added_at,
        }
    }
}

/// A saved favorite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteItem {
    pub product_id: ProductId,
    #[serde(flatten)]
    pub name: LocalizedName,
    pub price: Price,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default = "Utc::now")]
    pub date_added: DateTime<Utc>,
}

impl CollectionItem for FavoriteItem {
    fn product_id(&self) -> &ProductId {
        &self.product_id
    }

    fn line_total(&self) -> Price {
        self.price
    }

    fn placeholder(product: &ProductSnapshot, _quantity: Quantity, added_at: DateTime<Utc>) -> Self {
        Self {
            product_id: product.product_id.clone(),
            name: product.name.clone(),
            price: product.price,
            image: product.image.clone(),
            date_added: added_at,
        }
    }
}
