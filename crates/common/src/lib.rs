//! Shared identifiers and actor types.

mod actor;
mod types;

pub use actor::{Actor, Role, UnknownRole};
pub use types::{AttachmentId, OrderId, OrderItemId, ProductId, UserId};
