//! Core types for Giftshop.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod collection;
pub mod email;
pub mod id;
pub mod item;
pub mod password;
pub mod price;

pub use collection::{LoadMode, ResourceCollection, Summary};
pub use email::{Email, EmailError};
pub use id::*;
pub use item::{CartItem, CollectionItem, FavoriteItem, LocalizedName, ProductSnapshot, Quantity, QuantityError};
pub use password::{PasswordError, validate_password};
pub use price::Price;
