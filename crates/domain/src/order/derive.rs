//! Order status derived from its items.

use crate::status::{OrderItemStatus, OrderStatus};

/// Derives the order status implied by its item statuses.
///
/// Cancelled and rejected items are ignored. When no live item remains the
/// order is cancelled. Otherwise all live items must share one status for a
/// status to be implied:
///
/// | live items        | order        |
/// |-------------------|--------------|
/// | `accepted`        | `confirmed`  |
/// | `packed`          | `processing` |
/// | `out_for_delivery`| `shipped`    |
/// | `delivered`       | `delivered`  |
///
/// Returns None for an empty input, mixed live statuses, or all-`pending`.
pub fn derive_order_status<I>(statuses: I) -> Option<OrderStatus>
where
    I: IntoIterator<Item = OrderItemStatus>,
{
    let mut seen_any = false;
    let mut shared: Option<OrderItemStatus> = None;

    for status in statuses {
        seen_any = true;
        if !status.is_live() {
            continue;
        }
        match shared {
            None => shared = Some(status),
            Some(existing) if existing == status => {}
            Some(_) => return None,
        }
    }

    if !seen_any {
        return None;
    }

    match shared {
        None => Some(OrderStatus::Cancelled),
        Some(OrderItemStatus::Accepted) => Some(OrderStatus::Confirmed),
        Some(OrderItemStatus::Packed) => Some(OrderStatus::Processing),
        Some(OrderItemStatus::OutForDelivery) => Some(OrderStatus::Shipped),
        Some(OrderItemStatus::Delivered) => Some(OrderStatus::Delivered),
        Some(
            OrderItemStatus::Pending | OrderItemStatus::Rejected | OrderItemStatus::Cancelled,
        ) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use OrderItemStatus::*;

    #[test]
    fn empty_input_derives_nothing() {
        assert_eq!(derive_order_status(Vec::<OrderItemStatus>::new()), None);
    }

    #[test]
    fn all_rejected_cancels_order() {
        assert_eq!(derive_order_status([Rejected]), Some(OrderStatus::Cancelled));
        assert_eq!(
            derive_order_status([Rejected, Cancelled]),
            Some(OrderStatus::Cancelled)
        );
    }

    #[test]
    fn shared_live_status_maps_to_order_status() {
        assert_eq!(
            derive_order_status([Accepted, Accepted]),
            Some(OrderStatus::Confirmed)
        );
        assert_eq!(derive_order_status([Packed]), Some(OrderStatus::Processing));
        assert_eq!(
            derive_order_status([OutForDelivery, OutForDelivery]),
            Some(OrderStatus::Shipped)
        );
        assert_eq!(
            derive_order_status([Delivered, Delivered]),
            Some(OrderStatus::Delivered)
        );
    }

    #[test]
    fn dead_items_are_ignored() {
        assert_eq!(
            derive_order_status([Delivered, Rejected, Delivered, Cancelled]),
            Some(OrderStatus::Delivered)
        );
    }

    #[test]
    fn mixed_live_statuses_derive_nothing() {
        assert_eq!(derive_order_status([Accepted, Packed]), None);
        assert_eq!(derive_order_status([Delivered, OutForDelivery]), None);
    }

    #[test]
    fn pending_items_derive_nothing() {
        assert_eq!(derive_order_status([Pending]), None);
        assert_eq!(derive_order_status([Pending, Rejected]), None);
    }
}
