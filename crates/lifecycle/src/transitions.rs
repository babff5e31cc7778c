//! Status transition engine: explicit order and item updates, derived order
//! status and the stock and payment side effects of each transition.

use common::{Actor, UserId};
use domain::{
    CancelOrder, OrderItem, OrderItemStatus, OrderStatus, PaymentStatus, StatusMachine,
    UpdateOrderItemStatus, UpdateOrderStatus, derive_order_status,
};
use store::Transaction;

use crate::access;
use crate::details::OrderDetails;
use crate::error::{LifecycleError, Result};
use crate::ledger::StockLedger;
use crate::notify::{Notification, NotificationEvent};

/// Notifications collected during a transaction, dispatched after commit.
pub type Outbox = Vec<Notification>;

/// Reason recorded on items cancelled together with their order.
pub const ORDER_CANCELLED_REASON: &str = "order cancelled";

pub(crate) fn record_transition(entity: &'static str, to: impl std::fmt::Display) {
    metrics::counter!(
        "order_status_transitions_total",
        "entity" => entity,
        "to" => to.to_string()
    )
    .increment(1);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TransitionEngine {
    ledger: StockLedger,
}

impl TransitionEngine {
    pub fn new(ledger: StockLedger) -> Self {
        Self { ledger }
    }

    /// Applies an explicit, single-hop order status change requested by `actor`.
    ///
    /// Permission is checked before the transition table, so an allowed role
    /// asking for an unreachable status gets `InvalidStatusTransition`.
    pub async fn update_order_status<T: Transaction>(
        &self,
        tx: &mut T,
        actor: &Actor,
        request: &UpdateOrderStatus,
        outbox: &mut Outbox,
    ) -> Result<OrderDetails> {
        let mut details = OrderDetails::load(tx, request.order_id).await?;
        access::authorize_order_update(actor, &details, request.status)?;

        let before = details.items.clone();
        let previous = details.order.status();
        self.apply_order_transition(
            tx,
            &mut details,
            request.status,
            Some(actor.id),
            request.reason.as_deref(),
            outbox,
        )
        .await?;
        details.save(tx, &before).await?;

        tracing::info!(
            order_id = %details.order.id,
            from = %previous,
            to = %request.status,
            actor_id = %actor.id,
            "order status updated"
        );
        Ok(details)
    }

    /// Cancels an order. Same rules as an explicit update to `cancelled`.
    pub async fn cancel<T: Transaction>(
        &self,
        tx: &mut T,
        actor: &Actor,
        request: &CancelOrder,
        outbox: &mut Outbox,
    ) -> Result<OrderDetails> {
        let mut update = UpdateOrderStatus::new(request.order_id, OrderStatus::Cancelled);
        update.reason = request.reason.clone();
        self.update_order_status(tx, actor, &update, outbox).await
    }

    /// Applies an item status change, releases its stock when it leaves
    /// fulfillment and moves the order to the status its items imply.
    pub async fn update_item_status<T: Transaction>(
        &self,
        tx: &mut T,
        actor: &Actor,
        request: &UpdateOrderItemStatus,
        outbox: &mut Outbox,
    ) -> Result<OrderItem> {
        let not_found = || LifecycleError::not_found("order_item", request.item_id);
        let order_id = tx
            .order_id_for_item(request.item_id)
            .await?
            .ok_or_else(not_found)?;
        let mut details = OrderDetails::load(tx, order_id).await?;
        let index = details
            .items
            .iter()
            .position(|item| item.id == request.item_id)
            .ok_or_else(not_found)?;
        access::authorize_item_update(actor, &details.items[index])?;

        let before = details.items.clone();
        let previous = details.items[index].transition(request.status, request.reason.as_deref())?;
        record_transition(OrderItemStatus::ENTITY, request.status);

        self.release_stock(tx, &mut details.items, |item| {
            item.status().releases_stock()
        })
        .await?;
        self.sync_order_with_items(tx, &mut details, outbox).await?;
        details.save(tx, &before).await?;

        tracing::info!(
            order_id = %order_id,
            item_id = %request.item_id,
            from = %previous,
            to = %request.status,
            order_status = %details.order.status(),
            "order item status updated"
        );
        Ok(details.items.swap_remove(index))
    }

    /// Walks the order to the status implied by its items, if any.
    pub(crate) async fn sync_order_with_items<T: Transaction>(
        &self,
        tx: &mut T,
        details: &mut OrderDetails,
        outbox: &mut Outbox,
    ) -> Result<()> {
        let derived = derive_order_status(details.items.iter().map(OrderItem::status));
        match derived {
            Some(target) if target != details.order.status() => {
                self.walk_order(tx, details, target, outbox).await
            }
            _ => Ok(()),
        }
    }

    /// Moves the order forward along the shortest path to `target`, applying
    /// each step's side effects. An unreachable target leaves the order as is.
    pub(crate) async fn walk_order<T: Transaction>(
        &self,
        tx: &mut T,
        details: &mut OrderDetails,
        target: OrderStatus,
        outbox: &mut Outbox,
    ) -> Result<()> {
        let current = details.order.status();
        let Some(path) = current.path_to(target) else {
            tracing::debug!(
                order_id = %details.order.id,
                from = %current,
                to = %target,
                "derived order status not reachable, keeping current status"
            );
            return Ok(());
        };
        for step in path {
            self.apply_order_transition(tx, details, step, None, None, outbox)
                .await?;
        }
        Ok(())
    }

    async fn apply_order_transition<T: Transaction>(
        &self,
        tx: &mut T,
        details: &mut OrderDetails,
        to: OrderStatus,
        actor_id: Option<UserId>,
        reason: Option<&str>,
        outbox: &mut Outbox,
    ) -> Result<()> {
        details.order.transition(to, actor_id, reason)?;
        record_transition(OrderStatus::ENTITY, to);

        match to {
            OrderStatus::Cancelled => {
                let reason = reason
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .unwrap_or(ORDER_CANCELLED_REASON);
                for item in details
                    .items
                    .iter_mut()
                    .filter(|item| item.status().can_transition_to(OrderItemStatus::Cancelled))
                {
                    item.transition(OrderItemStatus::Cancelled, Some(reason))?;
                    record_transition(OrderItemStatus::ENTITY, OrderItemStatus::Cancelled);
                }
                self.release_stock(tx, &mut details.items, |item| {
                    item.status().releases_stock()
                })
                .await?;
                if details.order.delivery().is_active() {
                    details.order.delivery_mut().cancel();
                }
            }
            OrderStatus::ReturnApproved => {
                self.release_stock(tx, &mut details.items, |_| true).await?;
                if details.order.payment_status() == PaymentStatus::Paid {
                    details
                        .order
                        .set_payment_status(PaymentStatus::RefundPending)?;
                }
            }
            OrderStatus::Refunded => {
                if matches!(
                    details.order.payment_status(),
                    PaymentStatus::Paid | PaymentStatus::RefundPending
                ) {
                    details.order.set_payment_status(PaymentStatus::Refunded)?;
                }
            }
            _ => {}
        }

        if let Some(event) = NotificationEvent::for_order_status(to) {
            outbox.push(Notification::to_customer(event, &details.order));
        }
        Ok(())
    }

    /// Gives back the stock of every matching line not released yet.
    async fn release_stock<T, P>(
        &self,
        tx: &mut T,
        items: &mut [OrderItem],
        should_release: P,
    ) -> Result<()>
    where
        T: Transaction,
        P: Fn(&OrderItem) -> bool,
    {
        for item in items.iter_mut() {
            if !should_release(item) {
                continue;
            }
            if let Some((product_id, quantity)) = item.claim_stock_release() {
                self.ledger.release(tx, product_id, quantity).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use common::{ProductId, UserId};
    use domain::{CartLine, DomainError, Metadata, Money, PlaceOrder, Product, ProductStatus};
    use store::{InMemoryStore, Store};

    use super::*;
    use crate::builder::OrderBuilder;

    struct Fixture {
        store: InMemoryStore,
        seller: UserId,
        customer: UserId,
        product: ProductId,
    }

    async fn fixture(stock: u32) -> Fixture {
        let store = InMemoryStore::new();
        let seller = UserId::new();
        let product = Product::new(
            seller,
            "Widget",
            Money::from_cents(500),
            stock,
            ProductStatus::Published,
        )
        .unwrap();
        let mut tx = store.begin().await.unwrap();
        tx.insert_product(&product).await.unwrap();
        tx.commit().await.unwrap();
        Fixture {
            store,
            seller,
            customer: UserId::new(),
            product: product.id,
        }
    }

    async fn place(fx: &Fixture, quantity: u32) -> OrderDetails {
        let request = PlaceOrder::new(
            fx.customer,
            vec![CartLine::new(fx.product, quantity)],
            "1 Main St",
        );
        let lines = request.normalized_lines().unwrap();
        let mut tx = fx.store.begin().await.unwrap();
        let details = OrderBuilder::default()
            .build(&mut tx, &request, &lines, Metadata::new())
            .await
            .unwrap();
        tx.commit().await.unwrap();
        details
    }

    async fn stock(fx: &Fixture) -> u32 {
        let mut tx = fx.store.begin().await.unwrap();
        tx.get_product(fx.product).await.unwrap().unwrap().stock()
    }

    #[tokio::test]
    async fn rejecting_only_item_cancels_order_and_releases_stock() {
        let fx = fixture(5).await;
        let placed = place(&fx, 2).await;
        let engine = TransitionEngine::default();
        let mut outbox = Outbox::new();

        let mut tx = fx.store.begin().await.unwrap();
        let request =
            UpdateOrderItemStatus::new(placed.items[0].id, OrderItemStatus::Rejected);
        let item = engine
            .update_item_status(&mut tx, &Actor::seller(fx.seller), &request, &mut outbox)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(item.status(), OrderItemStatus::Rejected);
        assert!(item.stock_released());
        assert_eq!(stock(&fx).await, 5);

        let mut tx = fx.store.begin().await.unwrap();
        let order = tx.get_order(placed.order.id).await.unwrap().unwrap();
        assert_eq!(order.status(), OrderStatus::Cancelled);
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].event, NotificationEvent::OrderCancelled);
    }

    #[tokio::test]
    async fn accepting_items_confirms_order() {
        let fx = fixture(5).await;
        let placed = place(&fx, 1).await;
        let mut outbox = Outbox::new();

        let mut tx = fx.store.begin().await.unwrap();
        let request =
            UpdateOrderItemStatus::new(placed.items[0].id, OrderItemStatus::Accepted);
        TransitionEngine::default()
            .update_item_status(&mut tx, &Actor::seller(fx.seller), &request, &mut outbox)
            .await
            .unwrap();

        let order = tx.get_order(placed.order.id).await.unwrap().unwrap();
        assert_eq!(order.status(), OrderStatus::Confirmed);
        assert_eq!(order.history().len(), 1);
        assert!(order.history()[0].actor_id.is_none());
    }

    #[tokio::test]
    async fn cancelling_order_cancels_items_and_restores_stock_once() {
        let fx = fixture(5).await;
        let placed = place(&fx, 3).await;
        let engine = TransitionEngine::default();
        let customer = Actor::customer(fx.customer);
        let cancel = CancelOrder::new(placed.order.id);

        let mut tx = fx.store.begin().await.unwrap();
        let details = engine
            .cancel(&mut tx, &customer, &cancel, &mut Outbox::new())
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(details.order.status(), OrderStatus::Cancelled);
        assert_eq!(details.items[0].status(), OrderItemStatus::Cancelled);
        assert_eq!(
            details.items[0].cancellation_reason(),
            Some(ORDER_CANCELLED_REASON)
        );
        assert_eq!(stock(&fx).await, 5);

        let mut tx = fx.store.begin().await.unwrap();
        let err = engine
            .cancel(&mut tx, &customer, &cancel, &mut Outbox::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::Domain(DomainError::InvalidStatusTransition { .. })
        ));
        assert_eq!(stock(&fx).await, 5);
    }

    #[tokio::test]
    async fn forbidden_role_is_checked_before_transition() {
        let fx = fixture(5).await;
        let placed = place(&fx, 1).await;

        let mut tx = fx.store.begin().await.unwrap();
        let request = UpdateOrderStatus::new(placed.order.id, OrderStatus::Confirmed);
        let err = TransitionEngine::default()
            .update_order_status(
                &mut tx,
                &Actor::customer(fx.customer),
                &request,
                &mut Outbox::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Forbidden(_)));
    }

    #[tokio::test]
    async fn cancelling_item_requires_reason() {
        let fx = fixture(5).await;
        let placed = place(&fx, 1).await;

        let mut tx = fx.store.begin().await.unwrap();
        let request =
            UpdateOrderItemStatus::new(placed.items[0].id, OrderItemStatus::Cancelled);
        let err = TransitionEngine::default()
            .update_item_status(&mut tx, &Actor::seller(fx.seller), &request, &mut Outbox::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::Domain(DomainError::ReasonRequired)
        ));
    }

    #[tokio::test]
    async fn return_approval_releases_stock_and_marks_refund_pending() {
        let fx = fixture(5).await;
        let placed = place(&fx, 2).await;
        let engine = TransitionEngine::default();
        let admin = Actor::admin(UserId::new());

        let mut tx = fx.store.begin().await.unwrap();
        let mut order = tx.get_order(placed.order.id).await.unwrap().unwrap();
        order.set_payment_status(PaymentStatus::Paid).unwrap();
        tx.update_order(&mut order).await.unwrap();
        for status in [
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::ReturnRequested,
            OrderStatus::ReturnApproved,
        ] {
            let request = UpdateOrderStatus::new(placed.order.id, status);
            engine
                .update_order_status(&mut tx, &admin, &request, &mut Outbox::new())
                .await
                .unwrap();
        }
        tx.commit().await.unwrap();

        assert_eq!(stock(&fx).await, 5);
        let mut tx = fx.store.begin().await.unwrap();
        let order = tx.get_order(placed.order.id).await.unwrap().unwrap();
        assert_eq!(order.payment_status(), PaymentStatus::RefundPending);
        assert!(order.delivery().delivered_at().is_some());
    }

    #[tokio::test]
    async fn unknown_item_is_not_found() {
        let fx = fixture(5).await;
        let mut tx = fx.store.begin().await.unwrap();
        let request =
            UpdateOrderItemStatus::new(common::OrderItemId::new(), OrderItemStatus::Accepted);
        let err = TransitionEngine::default()
            .update_item_status(&mut tx, &Actor::admin(UserId::new()), &request, &mut Outbox::new())
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::NotFound { entity: "order_item", .. }));
    }
}
