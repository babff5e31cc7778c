//! Lifecycle service: the operations exposed to the transport layer.
//!
//! Every mutating operation runs as one unit of work in the coordinator.
//! Notifications collected during the unit are dispatched only after it
//! committed, and a failed notification never undoes the operation.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use common::{Actor, OrderId, ProductId};
use domain::{
    AssignDelivery, CancelOrder, CreateProduct, OrderItem, PlaceOrder, Product, ProductStatus,
    ProofOfDelivery, UpdateDeliveryStatus, UpdateOrderItemStatus, UpdateOrderStatus,
    UpdatePaymentStatus,
};
use serde_json::json;
use store::{Store, Transaction};

use crate::access;
use crate::assignment::FulfillmentAssignment;
use crate::attachments::{AttachmentStore, InMemoryAttachmentStore, ProofUpload};
use crate::builder::OrderBuilder;
use crate::coordinator::TransactionCoordinator;
use crate::details::OrderDetails;
use crate::error::{LifecycleError, Result};
use crate::ledger::StockLedger;
use crate::notify::{Notification, NotificationEvent, Notifier, TracingNotifier};
use crate::retry::RetryPolicy;
use crate::transitions::{Outbox, TransitionEngine};

/// Order lifecycle operations over a store and the outbound ports.
#[derive(Clone)]
pub struct LifecycleService<S: Store> {
    coordinator: TransactionCoordinator<S>,
    ledger: StockLedger,
    builder: OrderBuilder,
    engine: TransitionEngine,
    fulfillment: FulfillmentAssignment,
    notifier: Arc<dyn Notifier>,
    attachments: Arc<dyn AttachmentStore>,
}

impl<S: Store> std::fmt::Debug for LifecycleService<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleService")
            .field("policy", &self.coordinator.policy())
            .finish_non_exhaustive()
    }
}

impl<S: Store> LifecycleService<S> {
    pub fn new(
        store: S,
        policy: RetryPolicy,
        notifier: Arc<dyn Notifier>,
        attachments: Arc<dyn AttachmentStore>,
    ) -> Self {
        let ledger = StockLedger::new();
        let engine = TransitionEngine::new(ledger);
        Self {
            coordinator: TransactionCoordinator::new(store, policy),
            ledger,
            builder: OrderBuilder::new(ledger),
            engine,
            fulfillment: FulfillmentAssignment::new(engine),
            notifier,
            attachments,
        }
    }

    /// Default retry policy, log-only notifications and in-memory attachments.
    pub fn with_defaults(store: S) -> Self {
        Self::new(
            store,
            RetryPolicy::default(),
            Arc::new(TracingNotifier),
            Arc::new(InMemoryAttachmentStore::new()),
        )
    }

    pub fn store(&self) -> &S {
        self.coordinator.store()
    }

    // Catalog

    #[tracing::instrument(skip(self, request), fields(actor_id = %actor.id, name = %request.name))]
    pub async fn create_product(&self, actor: &Actor, request: CreateProduct) -> Result<Product> {
        access::authorize_product_create(actor)?;
        let product = Product::new(
            actor.id,
            request.name.trim(),
            request.price,
            request.stock,
            request.status,
        )?;

        let product = &product;
        let created = self
            .coordinator
            .run("create_product", move |mut tx| async move {
                let result = tx.insert_product(product).await.map_err(LifecycleError::from);
                (tx, result.map(|()| product.clone()))
            })
            .await?;

        tracing::info!(product_id = %created.id, stock = created.stock(), "product created");
        Ok(created)
    }

    #[tracing::instrument(skip(self), fields(actor_id = %actor.id))]
    pub async fn set_product_stock(
        &self,
        actor: &Actor,
        product_id: ProductId,
        stock: u32,
    ) -> Result<Product> {
        let ledger = &self.ledger;
        self.coordinator
            .run("set_product_stock", move |mut tx| async move {
                let result = restock(&mut tx, ledger, actor, product_id, stock).await;
                (tx, result)
            })
            .await
    }

    #[tracing::instrument(skip(self), fields(actor_id = %actor.id))]
    pub async fn update_product_status(
        &self,
        actor: &Actor,
        product_id: ProductId,
        status: ProductStatus,
    ) -> Result<Product> {
        let product = self
            .coordinator
            .run("update_product_status", move |mut tx| async move {
                let result = set_product_status(&mut tx, actor, product_id, status).await;
                (tx, result)
            })
            .await?;

        tracing::info!(product_id = %product_id, status = %product.status(), "product status updated");
        Ok(product)
    }

    #[tracing::instrument(skip(self), fields(actor_id = %actor.id))]
    pub async fn get_product(&self, actor: &Actor, product_id: ProductId) -> Result<Product> {
        self.read(move |mut tx| async move {
            let result = load_product(&mut tx, product_id).await;
            (tx, result)
        })
        .await
    }

    // Orders

    #[tracing::instrument(
        skip(self, request),
        fields(actor_id = %actor.id, role = %actor.role, customer_id = %request.customer_id)
    )]
    pub async fn place_order(&self, actor: &Actor, request: PlaceOrder) -> Result<OrderDetails> {
        access::authorize_place_order(actor, request.customer_id)?;
        let lines = request.normalized_lines()?;

        let mut metadata = request.metadata.clone();
        if actor.id != request.customer_id {
            metadata.insert("placed_by".to_string(), json!(actor.id));
            metadata.insert("placed_by_role".to_string(), json!(actor.role));
        }

        let (builder, request, lines, metadata) = (&self.builder, &request, &lines, &metadata);
        let details = self
            .coordinator
            .run("place_order", move |mut tx| async move {
                let result = builder.build(&mut tx, request, lines, metadata.clone()).await;
                (tx, result)
            })
            .await?;

        metrics::counter!("orders_placed_total").increment(1);
        tracing::info!(
            order_id = %details.order.id,
            order_number = %details.order.order_number,
            total = %details.order.total(),
            lines = details.items.len(),
            "order placed"
        );
        self.dispatch(vec![Notification::to_customer(
            NotificationEvent::OrderPlaced,
            &details.order,
        )])
        .await;
        Ok(details)
    }

    #[tracing::instrument(skip(self), fields(actor_id = %actor.id))]
    pub async fn get_order(&self, actor: &Actor, order_id: OrderId) -> Result<OrderDetails> {
        self.read(move |mut tx| async move {
            let result = load_visible(&mut tx, actor, order_id).await;
            (tx, result)
        })
        .await
    }

    #[tracing::instrument(skip(self, request), fields(actor_id = %actor.id, order_id = %request.order_id, status = %request.status))]
    pub async fn update_order_status(
        &self,
        actor: &Actor,
        request: UpdateOrderStatus,
    ) -> Result<OrderDetails> {
        let (engine, request) = (&self.engine, &request);
        let (details, outbox) = self
            .coordinator
            .run("update_order_status", move |mut tx| async move {
                let mut outbox = Outbox::new();
                let result = engine
                    .update_order_status(&mut tx, actor, request, &mut outbox)
                    .await
                    .map(|details| (details, outbox));
                (tx, result)
            })
            .await?;
        self.dispatch(outbox).await;
        Ok(details)
    }

    #[tracing::instrument(skip(self, request), fields(actor_id = %actor.id, order_id = %request.order_id))]
    pub async fn cancel_order(&self, actor: &Actor, request: CancelOrder) -> Result<OrderDetails> {
        let (engine, request) = (&self.engine, &request);
        let (details, outbox) = self
            .coordinator
            .run("cancel_order", move |mut tx| async move {
                let mut outbox = Outbox::new();
                let result = engine
                    .cancel(&mut tx, actor, request, &mut outbox)
                    .await
                    .map(|details| (details, outbox));
                (tx, result)
            })
            .await?;
        self.dispatch(outbox).await;
        Ok(details)
    }

    #[tracing::instrument(skip(self, request), fields(actor_id = %actor.id, item_id = %request.item_id, status = %request.status))]
    pub async fn update_order_item_status(
        &self,
        actor: &Actor,
        request: UpdateOrderItemStatus,
    ) -> Result<OrderItem> {
        let (engine, request) = (&self.engine, &request);
        let (item, outbox) = self
            .coordinator
            .run("update_order_item_status", move |mut tx| async move {
                let mut outbox = Outbox::new();
                let result = engine
                    .update_item_status(&mut tx, actor, request, &mut outbox)
                    .await
                    .map(|item| (item, outbox));
                (tx, result)
            })
            .await?;
        self.dispatch(outbox).await;
        Ok(item)
    }

    #[tracing::instrument(skip(self), fields(actor_id = %actor.id))]
    pub async fn update_payment_status(
        &self,
        actor: &Actor,
        request: UpdatePaymentStatus,
    ) -> Result<OrderDetails> {
        access::authorize_payment_update(actor)?;
        let details = self
            .coordinator
            .run("update_payment_status", move |mut tx| async move {
                let result = set_payment_status(&mut tx, &request).await;
                (tx, result)
            })
            .await?;

        tracing::info!(
            order_id = %request.order_id,
            payment_status = %request.status,
            "payment status updated"
        );
        Ok(details)
    }

    // Fulfillment

    #[tracing::instrument(skip(self, request), fields(actor_id = %actor.id, order_id = %request.order_id))]
    pub async fn assign_delivery(
        &self,
        actor: &Actor,
        request: AssignDelivery,
    ) -> Result<OrderDetails> {
        let (fulfillment, request) = (&self.fulfillment, &request);
        let (details, outbox) = self
            .coordinator
            .run("assign_delivery", move |mut tx| async move {
                let mut outbox = Outbox::new();
                let result = fulfillment
                    .assign(&mut tx, actor, request, &mut outbox)
                    .await
                    .map(|details| (details, outbox));
                (tx, result)
            })
            .await?;
        self.dispatch(outbox).await;
        Ok(details)
    }

    #[tracing::instrument(skip(self, request), fields(actor_id = %actor.id, order_id = %request.order_id, status = %request.status))]
    pub async fn update_delivery_status(
        &self,
        actor: &Actor,
        request: UpdateDeliveryStatus,
    ) -> Result<OrderDetails> {
        let (fulfillment, request) = (&self.fulfillment, &request);
        let (details, outbox) = self
            .coordinator
            .run("update_delivery_status", move |mut tx| async move {
                let mut outbox = Outbox::new();
                let result = fulfillment
                    .update_delivery_status(&mut tx, actor, request, &mut outbox)
                    .await
                    .map(|details| (details, outbox));
                (tx, result)
            })
            .await?;
        self.dispatch(outbox).await;
        Ok(details)
    }

    /// Stores a proof-of-delivery file and links it to the order.
    ///
    /// The file is stored before the linking transaction, so a failed link
    /// leaves an unreferenced file behind.
    #[tracing::instrument(
        skip(self, upload),
        fields(actor_id = %actor.id, order_id = %upload.order_id, size = upload.bytes.len())
    )]
    pub async fn attach_delivery_proof(
        &self,
        actor: &Actor,
        upload: ProofUpload,
    ) -> Result<OrderDetails> {
        upload.validate()?;
        let order_id = upload.order_id;
        let kind = upload.kind;

        let fulfillment = &self.fulfillment;
        self.read(move |mut tx| async move {
            let result = match OrderDetails::load(&mut tx, order_id).await {
                Ok(details) => fulfillment.check_proof_allowed(actor, &details),
                Err(err) => Err(err),
            };
            (tx, result)
        })
        .await?;

        let stored = self.attachments.put(upload.into_attachment()).await?;
        let proof = ProofOfDelivery {
            attachment_id: stored.id,
            kind,
            location: stored.location,
            uploaded_by: actor.id,
            uploaded_at: Utc::now(),
        };

        let proof_ref = &proof;
        let linked = self
            .coordinator
            .run("attach_delivery_proof", move |mut tx| async move {
                let result = fulfillment
                    .append_proof(&mut tx, actor, order_id, proof_ref)
                    .await;
                (tx, result)
            })
            .await;
        if let Err(err) = &linked {
            tracing::warn!(
                attachment_id = %proof.attachment_id,
                error = %err,
                "proof stored but not linked to the order"
            );
        }
        linked
    }

    /// Runs `unit` in a transaction that is always rolled back.
    async fn read<T, F, Fut>(&self, unit: F) -> Result<T>
    where
        F: FnOnce(S::Tx) -> Fut,
        Fut: Future<Output = (S::Tx, Result<T>)>,
    {
        let tx = self.coordinator.store().begin().await?;
        let (tx, result) = unit(tx).await;
        if let Err(err) = tx.rollback().await {
            tracing::warn!(error = %err, "read transaction rollback failed");
        }
        result
    }

    async fn dispatch(&self, outbox: Outbox) {
        for notification in &outbox {
            if let Err(err) = self.notifier.notify(notification).await {
                metrics::counter!(
                    "notification_failures_total",
                    "event" => notification.event.as_str()
                )
                .increment(1);
                tracing::warn!(
                    event = %notification.event,
                    order_id = %notification.order_id,
                    recipient = %notification.recipient,
                    error = %err,
                    "notification failed"
                );
            }
        }
    }
}

async fn load_product<T: Transaction>(tx: &mut T, product_id: ProductId) -> Result<Product> {
    tx.get_product(product_id)
        .await?
        .ok_or_else(|| LifecycleError::not_found("product", product_id))
}

async fn restock<T: Transaction>(
    tx: &mut T,
    ledger: &StockLedger,
    actor: &Actor,
    product_id: ProductId,
    stock: u32,
) -> Result<Product> {
    let product = load_product(tx, product_id).await?;
    access::authorize_product_write(actor, &product)?;
    ledger.set_stock(tx, product_id, stock).await
}

async fn set_product_status<T: Transaction>(
    tx: &mut T,
    actor: &Actor,
    product_id: ProductId,
    status: ProductStatus,
) -> Result<Product> {
    let mut product = load_product(tx, product_id).await?;
    access::authorize_product_write(actor, &product)?;
    product.set_status(status)?;
    tx.update_product(&mut product).await?;
    Ok(product)
}

async fn load_visible<T: Transaction>(
    tx: &mut T,
    actor: &Actor,
    order_id: OrderId,
) -> Result<OrderDetails> {
    let details = OrderDetails::load(tx, order_id).await?;
    access::authorize_view(actor, &details)?;
    Ok(details)
}

async fn set_payment_status<T: Transaction>(
    tx: &mut T,
    request: &UpdatePaymentStatus,
) -> Result<OrderDetails> {
    let mut details = OrderDetails::load(tx, request.order_id).await?;
    let before = details.items.clone();
    details.order.set_payment_status(request.status)?;
    details.save(tx, &before).await?;
    Ok(details)
}
