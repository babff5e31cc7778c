//! Orders, their items and the embedded delivery assignment.

mod aggregate;
mod commands;
mod delivery;
mod derive;
mod item;
mod number;

pub use aggregate::{Metadata, Order, OrderParts, StatusChange};
pub use commands::{
    AssignDelivery, CancelOrder, CartLine, CreateProduct, PlaceOrder, UpdateDeliveryStatus,
    UpdateOrderItemStatus, UpdateOrderStatus, UpdatePaymentStatus,
};
pub use delivery::{DeliveryAssignment, DeliveryNote, ProofKind, ProofOfDelivery};
pub use derive::derive_order_status;
pub use item::{OrderItem, OrderItemParts};
pub use number::OrderNumber;
