//! Loading and saving an order together with its items.

use common::OrderId;
use domain::{Order, OrderItem};
use serde::Serialize;
use store::Transaction;

use crate::error::{LifecycleError, Result};

/// An order together with its items.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderDetails {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

impl OrderDetails {
    /// Loads (and locks) an order and all of its items.
    pub(crate) async fn load<T: Transaction>(tx: &mut T, order_id: OrderId) -> Result<Self> {
        let order = tx
            .get_order(order_id)
            .await?
            .ok_or_else(|| LifecycleError::not_found("order", order_id))?;
        let items = tx.get_order_items(order_id).await?;
        Ok(Self { order, items })
    }

    /// Writes back every item that differs from `before`, then the order.
    ///
    /// The order row is always rewritten so concurrent writers of one order
    /// conflict even when they touch different items.
    pub(crate) async fn save<T: Transaction>(
        &mut self,
        tx: &mut T,
        before: &[OrderItem],
    ) -> Result<()> {
        for (item, old) in self.items.iter_mut().zip(before) {
            if *item != *old {
                tx.update_order_item(item).await?;
            }
        }
        self.order.touch();
        tx.update_order(&mut self.order).await?;
        Ok(())
    }
}
