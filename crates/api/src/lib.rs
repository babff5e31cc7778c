//! HTTP API for the marketplace order lifecycle.
//!
//! Exposes catalog, order, item and delivery endpoints over a
//! [`LifecycleService`], with structured logging (tracing) and Prometheus
//! metrics. Callers are identified by the `x-actor-id` and `x-actor-role`
//! headers set by an upstream gateway.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::middleware::map_response_with_state;
use axum::routing::{get, patch, post, put};
use lifecycle::{InMemoryAttachmentStore, LifecycleService, RetryPolicy, TracingNotifier};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state for all handlers.
pub struct AppState<S: Store> {
    pub service: LifecycleService<S>,
}

impl<S: Store> AppState<S> {
    pub fn new(service: LifecycleService<S>) -> Arc<Self> {
        Arc::new(Self { service })
    }
}

/// Creates the default application state over `store`.
pub fn create_state<S: Store>(store: S, policy: RetryPolicy) -> Arc<AppState<S>> {
    AppState::new(LifecycleService::new(
        store,
        policy,
        Arc::new(TracingNotifier),
        Arc::new(InMemoryAttachmentStore::new()),
    ))
}

/// Creates the Axum application router with all routes and shared state.
///
/// Unless `expose_error_details` is set, 5xx response bodies carry a generic
/// message; the full error is logged either way.
pub fn create_app<S: Store>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
    expose_error_details: bool,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::system::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::system::health))
        // Catalog
        .route("/products", post(routes::products::create::<S>))
        .route("/products/{id}", get(routes::products::get::<S>))
        .route("/products/{id}/stock", put(routes::products::set_stock::<S>))
        .route("/products/{id}/status", put(routes::products::set_status::<S>))
        // Orders
        .route("/orders", post(routes::orders::place::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/{id}/status", patch(routes::orders::update_status::<S>))
        .route("/orders/{id}/cancel", post(routes::orders::cancel::<S>))
        .route("/orders/{id}/payment", patch(routes::orders::update_payment::<S>))
        .route(
            "/order-items/{id}/status",
            patch(routes::orders::update_item_status::<S>),
        )
        // Fulfillment
        .route("/orders/{id}/delivery", post(routes::delivery::assign::<S>))
        .route(
            "/orders/{id}/delivery/status",
            patch(routes::delivery::update_status::<S>),
        )
        .route(
            "/orders/{id}/delivery/proof",
            post(routes::delivery::attach_proof::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(map_response_with_state(
            expose_error_details,
            error::redact_internal,
        ))
        .layer(
            ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            ),
        )
}
