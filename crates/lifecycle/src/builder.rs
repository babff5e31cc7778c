//! Order aggregate builder: cart to persisted order.

use chrono::Utc;
use common::OrderId;
use domain::{CartLine, Metadata, Order, OrderItem, OrderNumber, PlaceOrder};
use store::Transaction;

use crate::details::OrderDetails;
use crate::error::Result;
use crate::ledger::StockLedger;

/// Builds an order and its items from a cart, reserving stock line by line.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderBuilder {
    ledger: StockLedger,
}

impl OrderBuilder {
    pub fn new(ledger: StockLedger) -> Self {
        Self { ledger }
    }

    /// Reserves every line and inserts the order with its items.
    ///
    /// `lines` must come from [`PlaceOrder::normalized_lines`], which merges
    /// duplicates and sorts by product id so concurrent builders lock
    /// products in the same order. Any failure leaves the transaction to be
    /// rolled back by the caller; nothing is committed here.
    pub async fn build<T: Transaction>(
        &self,
        tx: &mut T,
        request: &PlaceOrder,
        lines: &[CartLine],
        metadata: Metadata,
    ) -> Result<OrderDetails> {
        let order_id = OrderId::new();
        let mut items = Vec::with_capacity(lines.len());

        for line in lines {
            let product = self
                .ledger
                .reserve(tx, line.product_id, line.quantity)
                .await?;
            items.push(OrderItem::new(order_id, &product, line.quantity)?);
        }

        let order = Order::new(
            order_id,
            request.customer_id,
            OrderNumber::generate(Utc::now()),
            &items,
            request.shipping_address.trim(),
            request.billing_address.clone(),
            metadata,
        )?;
        tx.insert_order(&order, &items).await?;

        tracing::debug!(
            order_id = %order.id,
            order_number = %order.order_number,
            lines = items.len(),
            total = %order.total(),
            "order built"
        );
        Ok(OrderDetails { order, items })
    }
}
