//! Order lifecycle engine.
//!
//! This crate owns every write path of the marketplace order lifecycle:
//!
//! - [`StockLedger`] adjusts product stock inside a caller's transaction
//! - [`OrderBuilder`] turns a cart into a persisted order with its items
//! - [`TransitionEngine`] applies order and item status changes and their
//!   stock and payment side effects
//! - [`FulfillmentAssignment`] binds delivery persons and syncs their
//!   progress back into the order
//! - [`TransactionCoordinator`] runs each operation in one transaction with
//!   bounded retry
//!
//! [`LifecycleService`] ties them together behind actor-aware operations.

mod access;
pub mod assignment;
pub mod attachments;
pub mod builder;
pub mod coordinator;
mod details;
pub mod error;
pub mod ledger;
pub mod notify;
pub mod retry;
pub mod service;
pub mod transitions;

pub use assignment::FulfillmentAssignment;
pub use attachments::{
    AttachmentError, AttachmentStore, AttachmentUpload, InMemoryAttachmentStore, ProofUpload,
    StoredAttachment,
};
pub use builder::OrderBuilder;
pub use coordinator::TransactionCoordinator;
pub use details::OrderDetails;
pub use error::{ErrorKind, LifecycleError, Result};
pub use ledger::StockLedger;
pub use notify::{
    InMemoryNotifier, Notification, NotificationEvent, Notifier, NotifyError, TracingNotifier,
};
pub use retry::RetryPolicy;
pub use service::LifecycleService;
pub use transitions::{ORDER_CANCELLED_REASON, Outbox, TransitionEngine};
