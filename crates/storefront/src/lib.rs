//! Giftshop storefront client core.
//!
//! Session handling, authenticated requests with transparent credential
//! refresh, and optimistic cart/favorites stores. Presentation is left to
//! the consumer: it reads store state and calls store mutators.
//!
//! Start from [`Storefront`], which wires everything once at startup.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod account;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod resources;
pub mod session;
pub mod state;
pub mod store;
pub mod transport;

pub use error::{ApiError, ValidationError};
pub use state::Storefront;
