//! Order status machine.

use common::Role;
use serde::{Deserialize, Serialize};

use super::StatusMachine;

/// The status of an order in its lifecycle.
///
/// ```text
/// Pending ──► Confirmed ──► Processing ──► Shipped ──► Delivered ──► Completed
///    │            │              │                         │
///    └────────────┴──────────────┴──► Cancelled            ▼
///                                                   ReturnRequested ──► ReturnRejected
///                                                          │
///                                                          ▼
///                                                   ReturnApproved ──► ReturnCompleted
///                                                          │
///                                                          └──► Refunded
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Completed,
    Cancelled,
    ReturnRequested,
    ReturnApproved,
    ReturnRejected,
    ReturnCompleted,
    Refunded,
}

impl StatusMachine for OrderStatus {
    const ENTITY: &'static str = "order";

    fn allowed_next(&self) -> &'static [Self] {
        use OrderStatus::*;
        match self {
            Pending => &[Confirmed, Cancelled],
            Confirmed => &[Processing, Cancelled],
            Processing => &[Shipped, Cancelled],
            Shipped => &[Delivered],
            Delivered => &[Completed, ReturnRequested],
            ReturnRequested => &[ReturnApproved, ReturnRejected],
            ReturnApproved => &[ReturnCompleted, Refunded],
            Completed | Cancelled | Refunded | ReturnRejected | ReturnCompleted => &[],
        }
    }
}

super::status_strings!(OrderStatus {
    Pending => "pending",
    Confirmed => "confirmed",
    Processing => "processing",
    Shipped => "shipped",
    Delivered => "delivered",
    Completed => "completed",
    Cancelled => "cancelled",
    ReturnRequested => "return_requested",
    ReturnApproved => "return_approved",
    ReturnRejected => "return_rejected",
    ReturnCompleted => "return_completed",
    Refunded => "refunded",
});

impl OrderStatus {
    /// Returns true while the order can still be cancelled (not yet shipped).
    pub fn can_cancel(&self) -> bool {
        self.can_transition_to(OrderStatus::Cancelled)
    }

    /// Returns true if `role` may request this status explicitly.
    ///
    /// Ownership is checked separately; this only covers which statuses a role
    /// is ever allowed to set.
    pub fn settable_by(&self, role: Role) -> bool {
        use OrderStatus::*;
        match role {
            Role::Admin => true,
            Role::Customer => matches!(self, Cancelled | ReturnRequested | Completed),
            Role::Seller => matches!(
                self,
                Confirmed
                    | Processing
                    | Shipped
                    | Cancelled
                    | Completed
                    | ReturnApproved
                    | ReturnRejected
                    | ReturnCompleted
                    | Refunded
            ),
            Role::DeliveryPerson | Role::Salesman => false,
        }
    }
}
