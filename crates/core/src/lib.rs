//! Giftshop Core - Shared domain types.
//!
//! This crate provides the types shared by the storefront client and its
//! consumers:
//! - `storefront` - Session, authenticated requests, and optimistic stores
//! - `cli` - Command-line consumer of the storefront client
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients, no async runtime. Collection arithmetic (counts, totals,
//! placeholder insertion) lives here so it can be tested without a network.
//!
//! # Modules
//!
//! - [`types`] - Ids, prices, emails, passwords, items, and collections

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
