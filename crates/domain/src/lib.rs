//! Domain layer for the marketplace order engine.
//!
//! Pure rules with no I/O:
//! - closed status enums with their transition tables
//! - order, order item, delivery assignment and product entities
//! - order status derivation from item statuses
//! - cart validation and order-number generation

mod error;
mod money;
pub mod order;
mod product;
pub mod status;

pub use error::DomainError;
pub use money::Money;
pub use order::{
    AssignDelivery, CancelOrder, CartLine, CreateProduct, DeliveryAssignment, DeliveryNote,
    Metadata, Order, OrderItem, OrderItemParts, OrderNumber, OrderParts, PlaceOrder, ProofKind,
    ProofOfDelivery, StatusChange, UpdateDeliveryStatus, UpdateOrderItemStatus,
    UpdateOrderStatus, UpdatePaymentStatus, derive_order_status,
};
pub use product::{Product, ProductStatus};
pub use status::{DeliveryStatus, OrderItemStatus, OrderStatus, PaymentStatus, StatusMachine};
