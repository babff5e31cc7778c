//! Order item status machine.

use serde::{Deserialize, Serialize};

use super::StatusMachine;

/// The status of one seller's line within an order.
///
/// ```text
/// Pending ──► Accepted ──► Packed ──► OutForDelivery ──► Delivered
///    │  │         │           │             │
///    │  └─► Rejected          │             │
///    └────────────┴───────────┴─────────────┴──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderItemStatus {
    #[default]
    Pending,
    Accepted,
    Rejected,
    Packed,
    OutForDelivery,
    Delivered,
    Cancelled,
}

impl StatusMachine for OrderItemStatus {
    const ENTITY: &'static str = "order item";

    fn allowed_next(&self) -> &'static [Self] {
        use OrderItemStatus::*;
        match self {
            Pending => &[Accepted, Rejected, Cancelled],
            Accepted => &[Packed, Cancelled],
            Packed => &[OutForDelivery, Cancelled],
            OutForDelivery => &[Delivered, Cancelled],
            Delivered | Rejected | Cancelled => &[],
        }
    }
}

super::status_strings!(OrderItemStatus {
    Pending => "pending",
    Accepted => "accepted",
    Rejected => "rejected",
    Packed => "packed",
    OutForDelivery => "out_for_delivery",
    Delivered => "delivered",
    Cancelled => "cancelled",
});

impl OrderItemStatus {
    /// Returns true for items that still take part in fulfillment.
    pub fn is_live(&self) -> bool {
        !matches!(self, OrderItemStatus::Cancelled | OrderItemStatus::Rejected)
    }

    /// Returns true if reaching this status gives the line's stock back.
    pub fn releases_stock(&self) -> bool {
        !self.is_live()
    }
}
