//! Domain error types.

use common::ProductId;
use thiserror::Error;

/// Business-rule violations detected by the pure domain layer.
///
/// None of these imply that anything was written: every check runs before
/// the corresponding mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// The requested status change is not in the transition table.
    #[error(
        "Invalid {entity} status transition from {from} to {to} (allowed: {})",
        allowed_list(.allowed)
    )]
    InvalidStatusTransition {
        entity: &'static str,
        from: String,
        to: String,
        allowed: Vec<String>,
    },

    /// Not enough stock to satisfy a reservation.
    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// The product exists but is not offered for sale.
    #[error("Product {product_id} is not available for sale (status: {status})")]
    ProductUnavailable { product_id: ProductId, status: String },

    /// A stock adjustment would overflow the stock counter.
    #[error("Stock overflow for product {product_id}")]
    StockOverflow { product_id: ProductId },

    /// A product status that only the stock ledger may set.
    #[error("Product status {status} cannot be set manually: {reason}")]
    ProductStatusLocked { status: String, reason: &'static str },

    /// Cart has no lines.
    #[error("Cart has no items")]
    EmptyCart,

    /// Invalid quantity.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// Invalid price.
    #[error("Invalid price: {price} (must be greater than 0)")]
    InvalidPrice { price: i64 },

    /// Order total does not fit the money representation.
    #[error("Order total overflow")]
    TotalOverflow,

    /// Shipping address is missing or blank.
    #[error("Shipping address is required")]
    ShippingAddressRequired,

    /// Cancelling an order item requires a reason.
    #[error("A reason is required to cancel an order item")]
    ReasonRequired,

    /// Generic malformed input.
    #[error("Validation failed: {0}")]
    Validation(String),
}

impl DomainError {
    /// Returns true for the transition-table violation variant.
    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, DomainError::InvalidStatusTransition { .. })
    }
}

fn allowed_list(allowed: &[String]) -> String {
    if allowed.is_empty() {
        "none, status is terminal".to_string()
    } else {
        allowed.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_transition_message_lists_allowed() {
        let err = DomainError::InvalidStatusTransition {
            entity: "order",
            from: "pending".to_string(),
            to: "shipped".to_string(),
            allowed: vec!["confirmed".to_string(), "cancelled".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Invalid order status transition from pending to shipped (allowed: confirmed, cancelled)"
        );
    }

    #[test]
    fn terminal_message_says_so() {
        let err = DomainError::InvalidStatusTransition {
            entity: "order",
            from: "cancelled".to_string(),
            to: "cancelled".to_string(),
            allowed: vec![],
        };
        assert!(err.to_string().contains("none, status is terminal"));
    }
}
