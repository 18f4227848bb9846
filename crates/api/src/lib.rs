//! HTTP API server with observability for the order/inventory core.
//!
//! Provides REST endpoints for checkout, order administration, payments and
//! analytics, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post};
use checkout::InMemoryPaymentGateway;
use metrics_exporter_prometheus::PrometheusHandle;
use order_store::OrderStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::{AppState, demo_products, seed_demo_catalog};

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: OrderStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::ops::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::ops::health::<S>))
        .route("/orders", post(routes::orders::create::<S>))
        .route("/orders/mine", get(routes::orders::mine::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route(
            "/orders/{id}/status",
            patch(routes::orders::update_status::<S>),
        )
        .route("/admin/orders", get(routes::orders::list_all::<S>))
        .route("/payments", post(routes::payments::process::<S>))
        .route(
            "/analytics/dashboard",
            get(routes::analytics::dashboard::<S>),
        )
        .route("/analytics/sales", get(routes::analytics::sales::<S>))
        .route("/analytics/revenue", get(routes::analytics::revenue::<S>))
        .route(
            "/analytics/top-products",
            get(routes::analytics::top_products::<S>),
        )
        .route(
            "/analytics/customers",
            get(routes::analytics::customers::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state over `store` with an in-memory payment gateway.
pub fn create_default_state<S: OrderStore + Clone + 'static>(
    store: S,
    backend: &'static str,
) -> Arc<AppState<S>> {
    Arc::new(AppState::new(store, InMemoryPaymentGateway::new(), backend))
}
