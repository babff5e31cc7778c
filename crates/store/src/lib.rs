//! Transactional persistence for the marketplace order engine.
//!
//! The [`Store`] / [`Transaction`] traits are the only persistence surface
//! the lifecycle layer sees. Two implementations ship here: an in-memory one
//! with optimistic version checks and a PostgreSQL one built on sqlx.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::{InMemoryStore, InMemoryTransaction};
pub use postgres::{PostgresStore, PostgresTransaction};
pub use store::{ORDER_NUMBER_CONSTRAINT, Store, Transaction};
