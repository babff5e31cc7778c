//! Payment status machine.

use serde::{Deserialize, Serialize};

use super::StatusMachine;

/// Payment state of an order. Refund execution happens elsewhere; the engine
/// only records that one is owed or done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    RefundPending,
    Refunded,
}

impl StatusMachine for PaymentStatus {
    const ENTITY: &'static str = "payment";

    fn allowed_next(&self) -> &'static [Self] {
        use PaymentStatus::*;
        match self {
            Pending => &[Paid, Failed],
            Failed => &[Pending],
            Paid => &[RefundPending, Refunded],
            RefundPending => &[Refunded],
            Refunded => &[],
        }
    }
}

super::status_strings!(PaymentStatus {
    Pending => "pending",
    Paid => "paid",
    Failed => "failed",
    RefundPending => "refund_pending",
    Refunded => "refunded",
});
