//! Catalog endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::ProductId;
use domain::{CreateProduct, Money, Product, ProductStatus};
use serde::{Deserialize, Serialize};
use store::Store;
use uuid::Uuid;

use crate::AppState;
use crate::auth::AuthenticatedActor;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub price_cents: i64,
    pub stock: u32,
    #[serde(default)]
    pub status: ProductStatus,
}

#[derive(Deserialize)]
pub struct SetStockRequest {
    pub stock: u32,
}

#[derive(Deserialize)]
pub struct SetStatusRequest {
    pub status: ProductStatus,
}

// -- Response types --

#[derive(Serialize)]
pub struct ProductResponse {
    pub id: String,
    pub seller_id: String,
    pub name: String,
    pub price_cents: i64,
    pub stock: u32,
    pub status: ProductStatus,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            id: product.id.to_string(),
            seller_id: product.seller_id.to_string(),
            stock: product.stock(),
            status: product.status(),
            price_cents: product.price.cents(),
            name: product.name,
            version: product.version,
            created_at: product.created_at,
            updated_at: product.updated_at,
        }
    }
}

// -- Handlers --

/// POST /products: create a catalog entry owned by the calling seller.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>), ApiError> {
    let request = CreateProduct::new(
        req.name,
        Money::from_cents(req.price_cents),
        req.stock,
        req.status,
    );
    let product = state.service.create_product(&actor, request).await?;
    Ok((StatusCode::CREATED, Json(product.into())))
}

/// GET /products/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product = state
        .service
        .get_product(&actor, ProductId::from_uuid(id))
        .await?;
    Ok(Json(product.into()))
}

/// PUT /products/{id}/stock: replace the stock counter.
#[tracing::instrument(skip(state, req))]
pub async fn set_stock<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
    Json(req): Json<SetStockRequest>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product = state
        .service
        .set_product_stock(&actor, ProductId::from_uuid(id), req.stock)
        .await?;
    Ok(Json(product.into()))
}

/// PUT /products/{id}/status: change the catalog status.
#[tracing::instrument(skip(state, req))]
pub async fn set_status<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
    Json(req): Json<SetStatusRequest>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product = state
        .service
        .update_product_status(&actor, ProductId::from_uuid(id), req.status)
        .await?;
    Ok(Json(product.into()))
}
