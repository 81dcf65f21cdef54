//! Domain models for the storefront client.
//!
//! These are wire-facing types exchanged with the auth and user endpoints.
//! Collection items live in `giftshop_core`.

pub mod auth;
pub mod user;

pub use auth::{Credentials, SignupForm};
pub use user::User;
