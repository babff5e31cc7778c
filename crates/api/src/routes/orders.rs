//! Order and order item endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{OrderId, OrderItemId, ProductId, UserId};
use domain::{
    CancelOrder, CartLine, DeliveryNote, DeliveryStatus, Metadata, OrderItem, OrderItemStatus,
    OrderStatus, PaymentStatus, PlaceOrder, ProofOfDelivery, StatusChange, UpdateOrderItemStatus,
    UpdateOrderStatus, UpdatePaymentStatus,
};
use lifecycle::OrderDetails;
use serde::{Deserialize, Serialize};
use store::Store;
use uuid::Uuid;

use crate::AppState;
use crate::auth::AuthenticatedActor;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct PlaceOrderRequest {
    /// Defaults to the calling actor.
    pub customer_id: Option<Uuid>,
    pub items: Vec<CartLineRequest>,
    pub shipping_address: String,
    #[serde(default)]
    pub billing_address: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Deserialize)]
pub struct CartLineRequest {
    pub product_id: Uuid,
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Deserialize)]
pub struct CancelOrderRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdatePaymentRequest {
    pub status: PaymentStatus,
}

#[derive(Deserialize)]
pub struct UpdateItemStatusRequest {
    pub status: OrderItemStatus,
    #[serde(default)]
    pub reason: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub order_number: String,
    pub customer_id: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub total_cents: i64,
    pub shipping_address: String,
    pub billing_address: Option<String>,
    pub cancellation_reason: Option<String>,
    pub metadata: Metadata,
    pub delivery: DeliveryResponse,
    pub items: Vec<OrderItemResponse>,
    pub history: Vec<StatusChange>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct DeliveryResponse {
    pub status: DeliveryStatus,
    pub delivery_person_id: Option<String>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub returned_at: Option<DateTime<Utc>>,
    pub notes: Vec<DeliveryNote>,
    pub proofs: Vec<ProofOfDelivery>,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub id: String,
    pub product_id: String,
    pub seller_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub status: OrderItemStatus,
    pub cancellation_reason: Option<String>,
    pub stock_released: bool,
}

impl From<OrderItem> for OrderItemResponse {
    fn from(item: OrderItem) -> Self {
        Self {
            id: item.id.to_string(),
            product_id: item.product_id.to_string(),
            seller_id: item.seller_id.to_string(),
            quantity: item.quantity,
            unit_price_cents: item.unit_price.cents(),
            status: item.status(),
            cancellation_reason: item.cancellation_reason().map(str::to_string),
            stock_released: item.stock_released(),
            product_name: item.product_name,
        }
    }
}

impl From<OrderDetails> for OrderResponse {
    fn from(details: OrderDetails) -> Self {
        let OrderDetails { order, items } = details;
        let delivery = order.delivery();
        Self {
            id: order.id.to_string(),
            order_number: order.order_number.to_string(),
            customer_id: order.customer_id.to_string(),
            status: order.status(),
            payment_status: order.payment_status(),
            total_cents: order.total().cents(),
            billing_address: order.billing_address.clone(),
            cancellation_reason: order.cancellation_reason().map(str::to_string),
            metadata: order.metadata.clone(),
            delivery: DeliveryResponse {
                status: delivery.status(),
                delivery_person_id: delivery.delivery_person_id().map(|id| id.to_string()),
                assigned_at: delivery.assigned_at(),
                picked_up_at: delivery.picked_up_at(),
                delivered_at: delivery.delivered_at(),
                returned_at: delivery.returned_at(),
                notes: delivery.notes().to_vec(),
                proofs: delivery.proofs().to_vec(),
            },
            items: items.into_iter().map(OrderItemResponse::from).collect(),
            history: order.history().to_vec(),
            version: order.version,
            created_at: order.created_at,
            updated_at: order.updated_at,
            shipping_address: order.shipping_address,
        }
    }
}

// -- Handlers --

/// POST /orders: place an order from a cart, reserving stock.
#[tracing::instrument(skip(state, req))]
pub async fn place<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Json(req): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let customer_id = req.customer_id.map_or(actor.id, UserId::from_uuid);
    let lines = req
        .items
        .iter()
        .map(|line| CartLine::new(ProductId::from_uuid(line.product_id), line.quantity))
        .collect();

    let mut request = PlaceOrder::new(customer_id, lines, req.shipping_address);
    request.billing_address = req.billing_address;
    request.metadata = req.metadata;

    let details = state.service.place_order(&actor, request).await?;
    Ok((StatusCode::CREATED, Json(details.into())))
}

/// GET /orders/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderResponse>, ApiError> {
    let details = state
        .service
        .get_order(&actor, OrderId::from_uuid(id))
        .await?;
    Ok(Json(details.into()))
}

/// PATCH /orders/{id}/status: explicit single-step status change.
#[tracing::instrument(skip(state, req))]
pub async fn update_status<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateOrderStatusRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let mut request = UpdateOrderStatus::new(OrderId::from_uuid(id), req.status);
    request.reason = req.reason;
    let details = state.service.update_order_status(&actor, request).await?;
    Ok(Json(details.into()))
}

/// POST /orders/{id}/cancel
#[tracing::instrument(skip(state, req))]
pub async fn cancel<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
    Json(req): Json<CancelOrderRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let mut request = CancelOrder::new(OrderId::from_uuid(id));
    request.reason = req.reason;
    let details = state.service.cancel_order(&actor, request).await?;
    Ok(Json(details.into()))
}

/// PATCH /orders/{id}/payment: admin-only payment status change.
#[tracing::instrument(skip(state, req))]
pub async fn update_payment<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdatePaymentRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let request = UpdatePaymentStatus::new(OrderId::from_uuid(id), req.status);
    let details = state.service.update_payment_status(&actor, request).await?;
    Ok(Json(details.into()))
}

/// PATCH /order-items/{id}/status: seller decision or progress on one line.
#[tracing::instrument(skip(state, req))]
pub async fn update_item_status<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateItemStatusRequest>,
) -> Result<Json<OrderItemResponse>, ApiError> {
    let mut request = UpdateOrderItemStatus::new(OrderItemId::from_uuid(id), req.status);
    request.reason = req.reason;
    let item = state
        .service
        .update_order_item_status(&actor, request)
        .await?;
    Ok(Json(item.into()))
}
