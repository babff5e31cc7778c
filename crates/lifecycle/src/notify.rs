//! Notification port.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use common::{OrderId, UserId};
use domain::{Order, OrderNumber, OrderStatus};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle moments a user is told about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationEvent {
    OrderPlaced,
    OrderConfirmed,
    OrderShipped,
    OrderDelivered,
    OrderCancelled,
    DeliveryAssigned,
    DeliveryCompleted,
}

impl NotificationEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationEvent::OrderPlaced => "order_placed",
            NotificationEvent::OrderConfirmed => "order_confirmed",
            NotificationEvent::OrderShipped => "order_shipped",
            NotificationEvent::OrderDelivered => "order_delivered",
            NotificationEvent::OrderCancelled => "order_cancelled",
            NotificationEvent::DeliveryAssigned => "delivery_assigned",
            NotificationEvent::DeliveryCompleted => "delivery_completed",
        }
    }

    /// The customer-facing event for reaching `status`, if there is one.
    pub fn for_order_status(status: OrderStatus) -> Option<Self> {
        match status {
            OrderStatus::Confirmed => Some(NotificationEvent::OrderConfirmed),
            OrderStatus::Shipped => Some(NotificationEvent::OrderShipped),
            OrderStatus::Delivered => Some(NotificationEvent::OrderDelivered),
            OrderStatus::Cancelled => Some(NotificationEvent::OrderCancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for NotificationEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A message to one user about one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub event: NotificationEvent,
    pub recipient: UserId,
    pub order_id: OrderId,
    pub order_number: OrderNumber,
}

impl Notification {
    pub fn new(event: NotificationEvent, recipient: UserId, order: &Order) -> Self {
        Self {
            event,
            recipient,
            order_id: order.id,
            order_number: order.order_number.clone(),
        }
    }

    /// Notification for the order's customer.
    pub fn to_customer(event: NotificationEvent, order: &Order) -> Self {
        Self::new(event, order.customer_id, order)
    }
}

#[derive(Debug, Error)]
#[error("Notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Dispatches notifications to users.
///
/// Called after the owning transaction committed. Failures are reported to
/// the caller, who logs them; they never undo the operation.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Notifier that only writes a log line per notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        tracing::info!(
            event = %notification.event,
            recipient = %notification.recipient,
            order_id = %notification.order_id,
            order_number = %notification.order_number,
            "notification dispatched"
        );
        Ok(())
    }
}

/// In-memory notifier for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
    fail: Arc<AtomicBool>,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the notifier to fail every call.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Returns every notification accepted so far.
    pub fn sent(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the events sent for an order, in order.
    pub fn events_for(&self, order_id: OrderId) -> Vec<NotificationEvent> {
        self.sent()
            .into_iter()
            .filter(|n| n.order_id == order_id)
            .map(|n| n.event)
            .collect()
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifyError("notifier configured to fail".to_string()));
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_status_events() {
        assert_eq!(
            NotificationEvent::for_order_status(OrderStatus::Shipped),
            Some(NotificationEvent::OrderShipped)
        );
        assert_eq!(NotificationEvent::for_order_status(OrderStatus::Processing), None);
    }

    #[tokio::test]
    async fn in_memory_notifier_records_and_fails_on_demand() {
        let notifier = InMemoryNotifier::new();
        let notification = Notification {
            event: NotificationEvent::OrderPlaced,
            recipient: UserId::new(),
            order_id: OrderId::new(),
            order_number: OrderNumber::new("ORD-1"),
        };

        notifier.notify(&notification).await.unwrap();
        notifier.set_fail(true);
        assert!(notifier.notify(&notification).await.is_err());

        assert_eq!(notifier.sent().len(), 1);
        assert_eq!(
            notifier.events_for(notification.order_id),
            vec![NotificationEvent::OrderPlaced]
        );
    }
}
