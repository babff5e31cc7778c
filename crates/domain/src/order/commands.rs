//! Requests accepted by the lifecycle engine.

use std::collections::BTreeMap;

use common::{OrderId, OrderItemId, ProductId, UserId};
use serde::{Deserialize, Serialize};

use super::Metadata;
use crate::status::{DeliveryStatus, OrderItemStatus, OrderStatus, PaymentStatus};
use crate::{DomainError, Money, ProductStatus};

/// One requested product and quantity in a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl CartLine {
    pub fn new(product_id: ProductId, quantity: u32) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// Request to place an order for a customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub customer_id: UserId,
    pub items: Vec<CartLine>,
    pub shipping_address: String,
    #[serde(default)]
    pub billing_address: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl PlaceOrder {
    pub fn new(customer_id: UserId, items: Vec<CartLine>, shipping_address: impl Into<String>) -> Self {
        Self {
            customer_id,
            items,
            shipping_address: shipping_address.into(),
            billing_address: None,
            metadata: Metadata::new(),
        }
    }

    pub fn with_billing_address(mut self, address: impl Into<String>) -> Self {
        self.billing_address = Some(address.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Validates the cart and returns its lines merged by product in
    /// ascending product-id order.
    pub fn normalized_lines(&self) -> Result<Vec<CartLine>, DomainError> {
        if self.items.is_empty() {
            return Err(DomainError::EmptyCart);
        }
        if self.shipping_address.trim().is_empty() {
            return Err(DomainError::ShippingAddressRequired);
        }

        let mut merged: BTreeMap<ProductId, u32> = BTreeMap::new();
        for line in &self.items {
            if line.quantity == 0 {
                return Err(DomainError::InvalidQuantity {
                    quantity: line.quantity,
                });
            }
            let quantity = merged.entry(line.product_id).or_insert(0);
            *quantity = quantity.checked_add(line.quantity).ok_or_else(|| {
                DomainError::Validation(format!(
                    "quantity overflow for product {}",
                    line.product_id
                ))
            })?;
        }

        Ok(merged
            .into_iter()
            .map(|(product_id, quantity)| CartLine::new(product_id, quantity))
            .collect())
    }
}

/// Explicit order status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateOrderStatus {
    pub order_id: OrderId,
    pub status: OrderStatus,
    #[serde(default)]
    pub reason: Option<String>,
}

impl UpdateOrderStatus {
    pub fn new(order_id: OrderId, status: OrderStatus) -> Self {
        Self {
            order_id,
            status,
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Seller-side change of one order item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateOrderItemStatus {
    pub item_id: OrderItemId,
    pub status: OrderItemStatus,
    #[serde(default)]
    pub reason: Option<String>,
}

impl UpdateOrderItemStatus {
    pub fn new(item_id: OrderItemId, status: OrderItemStatus) -> Self {
        Self {
            item_id,
            status,
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Binds a delivery person to an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignDelivery {
    pub order_id: OrderId,
    pub delivery_person_id: UserId,
}

impl AssignDelivery {
    pub fn new(order_id: OrderId, delivery_person_id: UserId) -> Self {
        Self {
            order_id,
            delivery_person_id,
        }
    }
}

/// Courier-reported delivery progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateDeliveryStatus {
    pub order_id: OrderId,
    pub status: DeliveryStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

impl UpdateDeliveryStatus {
    pub fn new(order_id: OrderId, status: DeliveryStatus) -> Self {
        Self {
            order_id,
            status,
            notes: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Cancels a whole order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOrder {
    pub order_id: OrderId,
    #[serde(default)]
    pub reason: Option<String>,
}

impl CancelOrder {
    pub fn new(order_id: OrderId) -> Self {
        Self {
            order_id,
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatePaymentStatus {
    pub order_id: OrderId,
    pub status: PaymentStatus,
}

impl UpdatePaymentStatus {
    pub fn new(order_id: OrderId, status: PaymentStatus) -> Self {
        Self { order_id, status }
    }
}

/// Catalog entry creation by a seller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProduct {
    pub name: String,
    pub price: Money,
    pub stock: u32,
    #[serde(default)]
    pub status: ProductStatus,
}

impl CreateProduct {
    pub fn new(name: impl Into<String>, price: Money, stock: u32, status: ProductStatus) -> Self {
        Self {
            name: name.into(),
            price,
            stock,
            status,
        }
    }
}
