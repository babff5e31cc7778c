//! HTTP route handlers.

pub mod delivery;
pub mod orders;
pub mod products;
pub mod system;
