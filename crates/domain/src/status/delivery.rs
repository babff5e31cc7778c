//! Delivery status machine.

use serde::{Deserialize, Serialize};

use super::StatusMachine;

/// The status of an order's delivery assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    #[default]
    Pending,
    Assigned,
    PickedUp,
    OutForDelivery,
    Delivered,
    Returned,
    Cancelled,
}

impl StatusMachine for DeliveryStatus {
    const ENTITY: &'static str = "delivery";

    fn allowed_next(&self) -> &'static [Self] {
        use DeliveryStatus::*;
        match self {
            Pending => &[Assigned, Cancelled],
            Assigned => &[PickedUp, Cancelled],
            PickedUp => &[OutForDelivery, Returned],
            OutForDelivery => &[Delivered, Returned],
            Delivered | Returned | Cancelled => &[],
        }
    }
}

super::status_strings!(DeliveryStatus {
    Pending => "pending",
    Assigned => "assigned",
    PickedUp => "picked_up",
    OutForDelivery => "out_for_delivery",
    Delivered => "delivered",
    Returned => "returned",
    Cancelled => "cancelled",
});

impl DeliveryStatus {
    /// Returns true while a delivery person is actively bound to the order.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            DeliveryStatus::Assigned | DeliveryStatus::PickedUp | DeliveryStatus::OutForDelivery
        )
    }

    /// Returns true for statuses the assigned delivery person may report.
    ///
    /// `assigned` comes from the seller's assignment and `cancelled` from
    /// order cancellation.
    pub fn is_courier_reportable(&self) -> bool {
        matches!(
            self,
            DeliveryStatus::PickedUp
                | DeliveryStatus::OutForDelivery
                | DeliveryStatus::Delivered
                | DeliveryStatus::Returned
        )
    }

    /// Successors the delivery person may report from this status.
    pub fn courier_next(&self) -> Vec<DeliveryStatus> {
        self.allowed_next()
            .iter()
            .copied()
            .filter(DeliveryStatus::is_courier_reportable)
            .collect()
    }
}
