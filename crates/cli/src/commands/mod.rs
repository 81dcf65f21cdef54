//! CLI command implementations.

pub mod cart;
pub mod favorites;
pub mod session;
