//! Order aggregate root.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use common::{OrderId, UserId};
use serde::{Deserialize, Serialize};

use super::{DeliveryAssignment, OrderItem, OrderNumber};
use crate::status::{OrderStatus, PaymentStatus, StatusMachine};
use crate::{DomainError, Money};

/// Free-form order metadata.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// One recorded order status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub from: OrderStatus,
    pub to: OrderStatus,
    /// None when the change was derived from item statuses or delivery progress.
    pub actor_id: Option<UserId>,
    pub reason: Option<String>,
    pub at: DateTime<Utc>,
}

/// One customer purchase spanning one or more sellers.
///
/// Statuses are only changed through the transition methods so every change
/// goes through the transition tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: UserId,
    pub order_number: OrderNumber,
    total: Money,
    status: OrderStatus,
    payment_status: PaymentStatus,
    delivery: DeliveryAssignment,
    pub shipping_address: String,
    pub billing_address: Option<String>,
    pub metadata: Metadata,
    cancellation_reason: Option<String>,
    history: Vec<StatusChange>,
    /// Row version for optimistic concurrency.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Persisted fields of an order, used to rebuild it from storage.
#[derive(Debug, Clone)]
pub struct OrderParts {
    pub id: OrderId,
    pub customer_id: UserId,
    pub order_number: OrderNumber,
    pub total: Money,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub delivery: DeliveryAssignment,
    pub shipping_address: String,
    pub billing_address: Option<String>,
    pub metadata: Metadata,
    pub cancellation_reason: Option<String>,
    pub history: Vec<StatusChange>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Creates a pending order whose total is the sum of `items`.
    ///
    /// Every item must already carry `id` as its order reference.
    pub fn new(
        id: OrderId,
        customer_id: UserId,
        order_number: OrderNumber,
        items: &[OrderItem],
        shipping_address: impl Into<String>,
        billing_address: Option<String>,
        metadata: Metadata,
    ) -> Result<Self, DomainError> {
        if items.is_empty() {
            return Err(DomainError::EmptyCart);
        }
        let shipping_address = shipping_address.into();
        if shipping_address.trim().is_empty() {
            return Err(DomainError::ShippingAddressRequired);
        }
        if let Some(stray) = items.iter().find(|item| item.order_id != id) {
            return Err(DomainError::Validation(format!(
                "item {} belongs to order {}",
                stray.id, stray.order_id
            )));
        }

        let total = items.iter().try_fold(Money::zero(), |acc, item| {
            item.line_total()
                .and_then(|line| acc.checked_add(line))
                .ok_or(DomainError::TotalOverflow)
        })?;

        let now = Utc::now();
        Ok(Self {
            id,
            customer_id,
            order_number,
            total,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            delivery: DeliveryAssignment::default(),
            shipping_address,
            billing_address: billing_address.filter(|b| !b.trim().is_empty()),
            metadata,
            cancellation_reason: None,
            history: Vec::new(),
            version: 1,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn from_parts(parts: OrderParts) -> Self {
        Self {
            id: parts.id,
            customer_id: parts.customer_id,
            order_number: parts.order_number,
            total: parts.total,
            status: parts.status,
            payment_status: parts.payment_status,
            delivery: parts.delivery,
            shipping_address: parts.shipping_address,
            billing_address: parts.billing_address,
            metadata: parts.metadata,
            cancellation_reason: parts.cancellation_reason,
            history: parts.history,
            version: parts.version,
            created_at: parts.created_at,
            updated_at: parts.updated_at,
        }
    }
}

// Query methods
impl Order {
    pub fn total(&self) -> Money {
        self.total
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    pub fn delivery(&self) -> &DeliveryAssignment {
        &self.delivery
    }

    pub fn cancellation_reason(&self) -> Option<&str> {
        self.cancellation_reason.as_deref()
    }

    pub fn history(&self) -> &[StatusChange] {
        &self.history
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

// Mutations
impl Order {
    /// Applies a single-step status change and records it in the history.
    ///
    /// Reaching `delivered` stamps the delivery time; reaching `cancelled`
    /// keeps the reason. Returns the previous status.
    pub fn transition(
        &mut self,
        next: OrderStatus,
        actor_id: Option<UserId>,
        reason: Option<&str>,
    ) -> Result<OrderStatus, DomainError> {
        let previous = self.status;
        previous.transition_to(next)?;

        let now = Utc::now();
        let reason = reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string);

        match next {
            OrderStatus::Delivered => self.delivery.stamp_delivered(now),
            OrderStatus::Cancelled => self.cancellation_reason = reason.clone(),
            _ => {}
        }

        self.status = next;
        self.history.push(StatusChange {
            from: previous,
            to: next,
            actor_id,
            reason,
            at: now,
        });
        self.updated_at = now;
        Ok(previous)
    }

    /// Applies a single-step payment status change. Returns the previous status.
    pub fn set_payment_status(&mut self, next: PaymentStatus) -> Result<PaymentStatus, DomainError> {
        let previous = self.payment_status;
        self.payment_status = previous.transition_to(next)?;
        self.updated_at = Utc::now();
        Ok(previous)
    }

    /// Mutable access to the embedded delivery assignment, whose own methods
    /// enforce the delivery transition table.
    pub fn delivery_mut(&mut self) -> &mut DeliveryAssignment {
        self.updated_at = Utc::now();
        &mut self.delivery
    }

    /// Marks the order as modified without changing any field.
    ///
    /// Item-level writes touch their order so concurrent writers on the same
    /// order conflict on the order row.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Product, ProductStatus};

    fn product(price: i64) -> Product {
        Product::new(
            UserId::new(),
            "Widget",
            Money::from_cents(price),
            100,
            ProductStatus::Published,
        )
        .unwrap()
    }

    fn order_with(items: &[(i64, u32)]) -> (Order, Vec<OrderItem>) {
        let id = OrderId::new();
        let items: Vec<OrderItem> = items
            .iter()
            .map(|(price, qty)| OrderItem::new(id, &product(*price), *qty).unwrap())
            .collect();
        let order = Order::new(
            id,
            UserId::new(),
            OrderNumber::generate(Utc::now()),
            &items,
            "1 Main St",
            None,
            Metadata::new(),
        )
        .unwrap();
        (order, items)
    }

    #[test]
    fn total_is_sum_of_lines() {
        let (order, items) = order_with(&[(1000, 2), (250, 3)]);
        let sum: Money = items.iter().map(|i| i.line_total().unwrap()).sum();
        assert_eq!(order.total(), sum);
        assert_eq!(order.total().cents(), 2750);
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.payment_status(), PaymentStatus::Pending);
    }

    #[test]
    fn empty_items_rejected() {
        let result = Order::new(
            OrderId::new(),
            UserId::new(),
            OrderNumber::new("ORD-1"),
            &[],
            "1 Main St",
            None,
            Metadata::new(),
        );
        assert_eq!(result.unwrap_err(), DomainError::EmptyCart);
    }

    #[test]
    fn blank_shipping_address_rejected() {
        let id = OrderId::new();
        let item = OrderItem::new(id, &product(100), 1).unwrap();
        let result = Order::new(
            id,
            UserId::new(),
            OrderNumber::new("ORD-1"),
            &[item],
            "  ",
            None,
            Metadata::new(),
        );
        assert_eq!(result.unwrap_err(), DomainError::ShippingAddressRequired);
    }

    #[test]
    fn foreign_item_rejected() {
        let item = OrderItem::new(OrderId::new(), &product(100), 1).unwrap();
        let result = Order::new(
            OrderId::new(),
            UserId::new(),
            OrderNumber::new("ORD-1"),
            &[item],
            "1 Main St",
            None,
            Metadata::new(),
        );
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn transition_records_history() {
        let (mut order, _) = order_with(&[(100, 1)]);
        let seller = UserId::new();

        let previous = order
            .transition(OrderStatus::Confirmed, Some(seller), None)
            .unwrap();

        assert_eq!(previous, OrderStatus::Pending);
        assert_eq!(order.history().len(), 1);
        assert_eq!(order.history()[0].actor_id, Some(seller));
        assert_eq!(order.history()[0].to, OrderStatus::Confirmed);
    }

    #[test]
    fn invalid_transition_changes_nothing() {
        let (mut order, _) = order_with(&[(100, 1)]);
        let before = order.clone();

        let err = order
            .transition(OrderStatus::Shipped, None, None)
            .unwrap_err();

        assert!(err.is_invalid_transition());
        assert_eq!(order, before);
    }

    #[test]
    fn cancel_keeps_reason() {
        let (mut order, _) = order_with(&[(100, 1)]);
        order
            .transition(OrderStatus::Cancelled, None, Some("changed my mind"))
            .unwrap();
        assert_eq!(order.cancellation_reason(), Some("changed my mind"));
        assert!(order.is_terminal());
    }

    #[test]
    fn delivered_stamps_timestamp() {
        let (mut order, _) = order_with(&[(100, 1)]);
        for next in [
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
        ] {
            order.transition(next, None, None).unwrap();
        }
        assert!(order.delivery().delivered_at().is_some());
    }

    #[test]
    fn payment_table_enforced() {
        let (mut order, _) = order_with(&[(100, 1)]);
        assert!(order.set_payment_status(PaymentStatus::Refunded).is_err());
        order.set_payment_status(PaymentStatus::Paid).unwrap();
        assert_eq!(order.payment_status(), PaymentStatus::Paid);
    }
}
