//! Delivery assignment, courier progress and proof-of-delivery upload.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use common::{OrderId, UserId};
use domain::{AssignDelivery, DeliveryStatus, ProofKind, UpdateDeliveryStatus};
use lifecycle::ProofUpload;
use serde::Deserialize;
use store::Store;
use uuid::Uuid;

use super::orders::OrderResponse;
use crate::AppState;
use crate::auth::AuthenticatedActor;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct AssignRequest {
    pub delivery_person_id: Uuid,
}

#[derive(Deserialize)]
pub struct DeliveryStatusRequest {
    pub status: DeliveryStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProofQuery {
    pub kind: ProofKind,
    pub file_name: String,
}

/// POST /orders/{id}/delivery
#[tracing::instrument(skip(state, req))]
pub async fn assign<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
    Json(req): Json<AssignRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let request = AssignDelivery::new(
        OrderId::from_uuid(id),
        UserId::from_uuid(req.delivery_person_id),
    );
    let details = state.service.assign_delivery(&actor, request).await?;
    Ok(Json(details.into()))
}

/// PATCH /orders/{id}/delivery/status: courier progress report.
#[tracing::instrument(skip(state, req))]
pub async fn update_status<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
    Json(req): Json<DeliveryStatusRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let mut request = UpdateDeliveryStatus::new(OrderId::from_uuid(id), req.status);
    request.notes = req.notes;
    let details = state.service.update_delivery_status(&actor, request).await?;
    Ok(Json(details.into()))
}

/// POST /orders/{id}/delivery/proof?kind=photo&file_name=door.jpg
///
/// The request body is the raw file.
#[tracing::instrument(skip(state, headers, body), fields(size = body.len()))]
pub async fn attach_proof<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
    Query(query): Query<ProofQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let upload = ProofUpload {
        order_id: OrderId::from_uuid(id),
        kind: query.kind,
        file_name: query.file_name,
        content_type,
        bytes: body.to_vec(),
    };
    let details = state.service.attach_delivery_proof(&actor, upload).await?;
    Ok((StatusCode::CREATED, Json(details.into())))
}
