//! Order items: one seller's line within an order.

use chrono::{DateTime, Utc};
use common::{OrderId, OrderItemId, ProductId, UserId};
use serde::{Deserialize, Serialize};

use crate::status::{OrderItemStatus, StatusMachine};
use crate::{DomainError, Money, Product};

/// A single line of an order, owned by exactly one seller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub seller_id: UserId,
    /// Product name at the time the order was placed.
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
    status: OrderItemStatus,
    cancelled: bool,
    cancellation_reason: Option<String>,
    /// Set once this line's quantity has been returned to stock.
    stock_released: bool,
    /// Row version for optimistic concurrency.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Persisted fields of an order item, used to rebuild it from storage.
#[derive(Debug, Clone)]
pub struct OrderItemParts {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub seller_id: UserId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub status: OrderItemStatus,
    pub cancelled: bool,
    pub cancellation_reason: Option<String>,
    pub stock_released: bool,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderItem {
    /// Creates a pending line for `quantity` units of `product`, priced at the
    /// product's current price.
    pub fn new(order_id: OrderId, product: &Product, quantity: u32) -> Result<Self, DomainError> {
        if quantity == 0 {
            return Err(DomainError::InvalidQuantity { quantity });
        }
        if !product.price.is_positive() {
            return Err(DomainError::InvalidPrice {
                price: product.price.cents(),
            });
        }

        let now = Utc::now();
        Ok(Self {
            id: OrderItemId::new(),
            order_id,
            product_id: product.id,
            seller_id: product.seller_id,
            product_name: product.name.clone(),
            quantity,
            unit_price: product.price,
            status: OrderItemStatus::Pending,
            cancelled: false,
            cancellation_reason: None,
            stock_released: false,
            version: 1,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn from_parts(parts: OrderItemParts) -> Self {
        Self {
            id: parts.id,
            order_id: parts.order_id,
            product_id: parts.product_id,
            seller_id: parts.seller_id,
            product_name: parts.product_name,
            quantity: parts.quantity,
            unit_price: parts.unit_price,
            status: parts.status,
            cancelled: parts.cancelled,
            cancellation_reason: parts.cancellation_reason,
            stock_released: parts.stock_released,
            version: parts.version,
            created_at: parts.created_at,
            updated_at: parts.updated_at,
        }
    }

    pub fn status(&self) -> OrderItemStatus {
        self.status
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn cancellation_reason(&self) -> Option<&str> {
        self.cancellation_reason.as_deref()
    }

    pub fn stock_released(&self) -> bool {
        self.stock_released
    }

    /// Returns `quantity * unit_price`, or None on overflow.
    pub fn line_total(&self) -> Option<Money> {
        self.unit_price.checked_multiply(self.quantity)
    }

    /// Applies a single-step status change.
    ///
    /// Cancelling requires a non-blank reason; rejecting accepts an optional
    /// one. Returns the previous status.
    pub fn transition(
        &mut self,
        next: OrderItemStatus,
        reason: Option<&str>,
    ) -> Result<OrderItemStatus, DomainError> {
        let previous = self.status;
        previous.transition_to(next)?;

        let reason = reason.map(str::trim).filter(|r| !r.is_empty());
        match next {
            OrderItemStatus::Cancelled => {
                let reason = reason.ok_or(DomainError::ReasonRequired)?;
                self.cancelled = true;
                self.cancellation_reason = Some(reason.to_string());
            }
            OrderItemStatus::Rejected => {
                self.cancellation_reason = reason.map(str::to_string);
            }
            _ => {}
        }

        self.status = next;
        self.updated_at = Utc::now();
        Ok(previous)
    }

    /// Claims this line's stock for release.
    ///
    /// Returns the product and quantity the first time it is called and None
    /// afterwards, so a line is never released twice.
    pub fn claim_stock_release(&mut self) -> Option<(ProductId, u32)> {
        if self.stock_released {
            return None;
        }
        self.stock_released = true;
        self.updated_at = Utc::now();
        Some((self.product_id, self.quantity))
    }
}
