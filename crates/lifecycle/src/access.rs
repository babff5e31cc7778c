//! Role and ownership rules for lifecycle operations.

use common::{Actor, Role, UserId};
use domain::{OrderItem, OrderStatus, Product};

use crate::details::OrderDetails;
use crate::error::{LifecycleError, Result};

fn owns_item(actor: &Actor, items: &[OrderItem]) -> bool {
    items.iter().any(|item| item.seller_id == actor.id)
}

fn owns_every_live_item(actor: &Actor, items: &[OrderItem]) -> bool {
    items
        .iter()
        .filter(|item| item.status().is_live())
        .all(|item| item.seller_id == actor.id)
}

/// Customers order for themselves; salesmen and admins may order on behalf
/// of any customer.
pub(crate) fn authorize_place_order(actor: &Actor, customer_id: UserId) -> Result<()> {
    match actor.role {
        Role::Customer if actor.id == customer_id => Ok(()),
        Role::Customer => Err(LifecycleError::forbidden(
            "customers may only place orders for themselves",
        )),
        Role::Salesman | Role::Admin => Ok(()),
        Role::Seller | Role::DeliveryPerson => Err(LifecycleError::forbidden(format!(
            "{} may not place orders",
            actor.role
        ))),
    }
}

/// Explicit order status updates: role permission plus ownership.
pub(crate) fn authorize_order_update(
    actor: &Actor,
    details: &OrderDetails,
    status: OrderStatus,
) -> Result<()> {
    match actor.role {
        Role::Customer if details.order.customer_id != actor.id => {
            return Err(LifecycleError::forbidden(
                "customers may only update their own orders",
            ));
        }
        Role::Seller if !owns_item(actor, &details.items) => {
            return Err(LifecycleError::forbidden(
                "seller has no items in this order",
            ));
        }
        // Cancelling the order cancels every live line.
        Role::Seller
            if status == OrderStatus::Cancelled
                && !owns_every_live_item(actor, &details.items) =>
        {
            return Err(LifecycleError::forbidden(
                "order has live items from other sellers; cancel or reject your own items instead",
            ));
        }
        _ => {}
    }
    if !status.settable_by(actor.role) {
        return Err(LifecycleError::forbidden(format!(
            "{} may not set order status {}",
            actor.role, status
        )));
    }
    Ok(())
}

/// Item updates belong to the item's seller.
pub(crate) fn authorize_item_update(actor: &Actor, item: &OrderItem) -> Result<()> {
    match actor.role {
        Role::Admin => Ok(()),
        Role::Seller if item.seller_id == actor.id => Ok(()),
        _ => Err(LifecycleError::forbidden(
            "only the item's seller may update it",
        )),
    }
}

/// Delivery assignment is done by a seller of the order.
pub(crate) fn authorize_assignment(actor: &Actor, details: &OrderDetails) -> Result<()> {
    match actor.role {
        Role::Admin => Ok(()),
        Role::Seller if owns_item(actor, &details.items) => Ok(()),
        Role::Seller => Err(LifecycleError::forbidden(
            "seller has no items in this order",
        )),
        _ => Err(LifecycleError::forbidden(format!(
            "{} may not assign deliveries",
            actor.role
        ))),
    }
}

/// Who may read an order.
pub(crate) fn authorize_view(actor: &Actor, details: &OrderDetails) -> Result<()> {
    let allowed = match actor.role {
        Role::Admin | Role::Salesman => true,
        Role::Customer => details.order.customer_id == actor.id,
        Role::Seller => owns_item(actor, &details.items),
        Role::DeliveryPerson => details.order.delivery().is_assigned_to(actor.id),
    };
    if allowed {
        Ok(())
    } else {
        Err(LifecycleError::forbidden("order is not visible to this user"))
    }
}

pub(crate) fn authorize_product_create(actor: &Actor) -> Result<()> {
    match actor.role {
        Role::Seller | Role::Admin => Ok(()),
        _ => Err(LifecycleError::forbidden(format!(
            "{} may not create products",
            actor.role
        ))),
    }
}

/// Catalog changes belong to the product's seller.
pub(crate) fn authorize_product_write(actor: &Actor, product: &Product) -> Result<()> {
    match actor.role {
        Role::Admin => Ok(()),
        Role::Seller if product.seller_id == actor.id => Ok(()),
        _ => Err(LifecycleError::forbidden(
            "only the product's seller may change it",
        )),
    }
}

pub(crate) fn authorize_payment_update(actor: &Actor) -> Result<()> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(LifecycleError::forbidden(
            "only admins may change payment status",
        ))
    }
}

#[cfg(test)]
mod tests {
    use common::{OrderId, UserId};
    use domain::{Metadata, Money, Order, OrderNumber, ProductStatus};

    use super::*;

    fn details(customer: UserId, seller: UserId) -> OrderDetails {
        let product = Product::new(
            seller,
            "Widget",
            Money::from_cents(100),
            5,
            ProductStatus::Published,
        )
        .unwrap();
        let id = OrderId::new();
        let items = vec![OrderItem::new(id, &product, 1).unwrap()];
        let order = Order::new(
            id,
            customer,
            OrderNumber::new("ORD-1"),
            &items,
            "1 Main St",
            None,
            Metadata::new(),
        )
        .unwrap();
        OrderDetails { order, items }
    }

    #[test]
    fn customers_order_for_themselves() {
        let customer = UserId::new();
        assert!(authorize_place_order(&Actor::customer(customer), customer).is_ok());
        assert!(authorize_place_order(&Actor::customer(customer), UserId::new()).is_err());
        assert!(authorize_place_order(&Actor::salesman(UserId::new()), customer).is_ok());
        assert!(authorize_place_order(&Actor::seller(UserId::new()), customer).is_err());
    }

    #[test]
    fn order_update_checks_ownership_then_role() {
        let (customer, seller) = (UserId::new(), UserId::new());
        let details = details(customer, seller);

        assert!(
            authorize_order_update(&Actor::customer(customer), &details, OrderStatus::Cancelled)
                .is_ok()
        );
        assert!(
            authorize_order_update(&Actor::customer(customer), &details, OrderStatus::Confirmed)
                .is_err()
        );
        assert!(
            authorize_order_update(
                &Actor::customer(UserId::new()),
                &details,
                OrderStatus::Cancelled
            )
            .is_err()
        );
        assert!(
            authorize_order_update(&Actor::seller(seller), &details, OrderStatus::Confirmed)
                .is_ok()
        );
        assert!(
            authorize_order_update(
                &Actor::seller(UserId::new()),
                &details,
                OrderStatus::Confirmed
            )
            .is_err()
        );
        assert!(
            authorize_order_update(
                &Actor::delivery_person(UserId::new()),
                &details,
                OrderStatus::Shipped
            )
            .is_err()
        );
        assert!(
            authorize_order_update(&Actor::admin(UserId::new()), &details, OrderStatus::Refunded)
                .is_ok()
        );
    }

    #[test]
    fn seller_cancels_only_orders_they_fully_own() {
        let (customer, seller, other) = (UserId::new(), UserId::new(), UserId::new());
        let mut details = details(customer, seller);
        let product = Product::new(
            other,
            "Gadget",
            Money::from_cents(200),
            5,
            ProductStatus::Published,
        )
        .unwrap();
        details
            .items
            .push(OrderItem::new(details.order.id, &product, 1).unwrap());

        let err = authorize_order_update(&Actor::seller(seller), &details, OrderStatus::Cancelled)
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Forbidden(_)));
        assert!(
            authorize_order_update(&Actor::seller(seller), &details, OrderStatus::Confirmed)
                .is_ok()
        );
        assert!(
            authorize_order_update(&Actor::customer(customer), &details, OrderStatus::Cancelled)
                .is_ok()
        );

        details.items[1]
            .transition(domain::OrderItemStatus::Rejected, None)
            .unwrap();
        assert!(
            authorize_order_update(&Actor::seller(seller), &details, OrderStatus::Cancelled)
                .is_ok()
        );
    }

    #[test]
    fn only_item_seller_updates_item() {
        let seller = UserId::new();
        let details = details(UserId::new(), seller);
        let item = &details.items[0];

        assert!(authorize_item_update(&Actor::seller(seller), item).is_ok());
        assert!(authorize_item_update(&Actor::seller(UserId::new()), item).is_err());
        assert!(authorize_item_update(&Actor::customer(details.order.customer_id), item).is_err());
        assert!(authorize_item_update(&Actor::admin(UserId::new()), item).is_ok());
    }

    #[test]
    fn view_rules() {
        let (customer, seller) = (UserId::new(), UserId::new());
        let details = details(customer, seller);

        assert!(authorize_view(&Actor::customer(customer), &details).is_ok());
        assert!(authorize_view(&Actor::seller(seller), &details).is_ok());
        assert!(authorize_view(&Actor::customer(UserId::new()), &details).is_err());
        assert!(authorize_view(&Actor::delivery_person(UserId::new()), &details).is_err());
    }
}
