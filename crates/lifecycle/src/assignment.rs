//! Fulfillment assignment: binding a delivery person to an order and
//! syncing courier progress back into order and item statuses.

use chrono::Utc;
use common::{Actor, OrderId};
use domain::{
    AssignDelivery, DeliveryStatus, DomainError, OrderItemStatus, OrderStatus, ProofOfDelivery,
    StatusMachine, UpdateDeliveryStatus,
};
use store::Transaction;

use crate::access;
use crate::details::OrderDetails;
use crate::error::{LifecycleError, Result};
use crate::notify::{Notification, NotificationEvent};
use crate::transitions::{Outbox, TransitionEngine, record_transition};

/// Order statuses in which a delivery person can be assigned.
const ASSIGNABLE: [OrderStatus; 2] = [OrderStatus::Confirmed, OrderStatus::Processing];

#[derive(Debug, Clone, Copy, Default)]
pub struct FulfillmentAssignment {
    engine: TransitionEngine,
}

impl FulfillmentAssignment {
    pub fn new(engine: TransitionEngine) -> Self {
        Self { engine }
    }

    /// Binds a delivery person to a confirmed or processing order, or to a
    /// shipped order whose previous delivery came back.
    pub async fn assign<T: Transaction>(
        &self,
        tx: &mut T,
        actor: &Actor,
        request: &AssignDelivery,
        outbox: &mut Outbox,
    ) -> Result<OrderDetails> {
        let mut details = OrderDetails::load(tx, request.order_id).await?;
        access::authorize_assignment(actor, &details)?;

        let status = details.order.status();
        if !ASSIGNABLE.contains(&status) && !awaits_redelivery(&details) {
            return Err(LifecycleError::InvalidOrderState {
                order_id: request.order_id,
                status,
                expected: "confirmed, processing, or shipped with a returned delivery"
                    .to_string(),
            });
        }
        if details.order.delivery().is_active() {
            return Err(LifecycleError::AlreadyAssigned {
                order_id: request.order_id,
            });
        }

        let before = details.items.clone();
        details
            .order
            .delivery_mut()
            .assign(request.delivery_person_id, Utc::now());
        record_transition(DeliveryStatus::ENTITY, DeliveryStatus::Assigned);
        details.save(tx, &before).await?;

        outbox.push(Notification::new(
            NotificationEvent::DeliveryAssigned,
            request.delivery_person_id,
            &details.order,
        ));
        tracing::info!(
            order_id = %request.order_id,
            delivery_person_id = %request.delivery_person_id,
            actor_id = %actor.id,
            "delivery assigned"
        );
        Ok(details)
    }

    /// Records courier progress and moves the order and its items along.
    pub async fn update_delivery_status<T: Transaction>(
        &self,
        tx: &mut T,
        actor: &Actor,
        request: &UpdateDeliveryStatus,
        outbox: &mut Outbox,
    ) -> Result<OrderDetails> {
        let mut details = OrderDetails::load(tx, request.order_id).await?;
        ensure_assigned(actor, &details)?;

        let current = details.order.delivery().status();
        if !request.status.is_courier_reportable() {
            return Err(DomainError::InvalidStatusTransition {
                entity: DeliveryStatus::ENTITY,
                from: current.to_string(),
                to: request.status.to_string(),
                allowed: current.courier_next().iter().map(ToString::to_string).collect(),
            }
            .into());
        }

        if request.status == DeliveryStatus::Delivered
            && details
                .items
                .iter()
                .any(|item| item.status() == OrderItemStatus::Pending)
        {
            return Err(LifecycleError::InvalidOrderState {
                order_id: request.order_id,
                status: details.order.status(),
                expected: "every live item accepted by its seller".to_string(),
            });
        }

        let before = details.items.clone();
        let now = Utc::now();
        let delivery = details.order.delivery_mut();
        delivery.advance(request.status, now)?;
        if let Some(notes) = &request.notes {
            delivery.add_note(notes.as_str(), now);
        }
        record_transition(DeliveryStatus::ENTITY, request.status);

        match request.status {
            DeliveryStatus::PickedUp => {
                self.engine
                    .walk_order(tx, &mut details, OrderStatus::Shipped, outbox)
                    .await?;
            }
            DeliveryStatus::OutForDelivery => {
                move_items(
                    &mut details,
                    &[OrderItemStatus::Accepted, OrderItemStatus::Packed],
                    OrderItemStatus::OutForDelivery,
                )?;
                self.engine
                    .sync_order_with_items(tx, &mut details, outbox)
                    .await?;
            }
            DeliveryStatus::Delivered => {
                move_items(
                    &mut details,
                    &[
                        OrderItemStatus::Accepted,
                        OrderItemStatus::Packed,
                        OrderItemStatus::OutForDelivery,
                    ],
                    OrderItemStatus::Delivered,
                )?;
                self.engine
                    .walk_order(tx, &mut details, OrderStatus::Delivered, outbox)
                    .await?;
                outbox.push(Notification::to_customer(
                    NotificationEvent::DeliveryCompleted,
                    &details.order,
                ));
            }
            _ => {}
        }
        details.save(tx, &before).await?;

        tracing::info!(
            order_id = %request.order_id,
            from = %current,
            to = %request.status,
            order_status = %details.order.status(),
            "delivery status updated"
        );
        Ok(details)
    }

    /// Checks that `actor` may attach proof to the order's delivery.
    pub fn check_proof_allowed(&self, actor: &Actor, details: &OrderDetails) -> Result<()> {
        ensure_assigned(actor, details)?;
        if details.order.delivery().status() == DeliveryStatus::Cancelled {
            return Err(LifecycleError::InvalidOrderState {
                order_id: details.order.id,
                status: details.order.status(),
                expected: "an order with an uncancelled delivery".to_string(),
            });
        }
        Ok(())
    }

    /// Appends an already stored proof-of-delivery reference.
    pub async fn append_proof<T: Transaction>(
        &self,
        tx: &mut T,
        actor: &Actor,
        order_id: OrderId,
        proof: &ProofOfDelivery,
    ) -> Result<OrderDetails> {
        let mut details = OrderDetails::load(tx, order_id).await?;
        self.check_proof_allowed(actor, &details)?;

        let before = details.items.clone();
        details.order.delivery_mut().add_proof(proof.clone());
        details.save(tx, &before).await?;

        tracing::info!(
            order_id = %order_id,
            attachment_id = %proof.attachment_id,
            kind = proof.kind.as_str(),
            "proof of delivery attached"
        );
        Ok(details)
    }
}

/// A shipped order whose courier returned it goes back out with a new one.
fn awaits_redelivery(details: &OrderDetails) -> bool {
    details.order.status() == OrderStatus::Shipped
        && details.order.delivery().status() == DeliveryStatus::Returned
}

fn ensure_assigned(actor: &Actor, details: &OrderDetails) -> Result<()> {
    if details.order.delivery().is_assigned_to(actor.id) {
        Ok(())
    } else {
        Err(LifecycleError::NotAssignedDeliveryPerson {
            order_id: details.order.id,
            actor_id: actor.id,
        })
    }
}

/// Walks every live item in one of `from` forward to `target`.
fn move_items(
    details: &mut OrderDetails,
    from: &[OrderItemStatus],
    target: OrderItemStatus,
) -> Result<()> {
    for item in details
        .items
        .iter_mut()
        .filter(|item| from.contains(&item.status()))
    {
        let Some(path) = item.status().path_to(target) else {
            continue;
        };
        for step in path {
            item.transition(step, None)?;
            record_transition(OrderItemStatus::ENTITY, step);
        }
    }
    Ok(())
}
