//! Order creation, lookup and status administration endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::OrderId;
use domain::{
    CreateOrderRequest, Order, OrderLifecycle, OrderStatus, OrderWithItems, PaymentStatus,
    ShippingAddress,
};
use order_store::{OrderLedger, OrderStore};
use serde::Deserialize;

use crate::error::ApiError;
use crate::routes::auth::{Admin, Identity};
use crate::state::AppState;

// -- Request types --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
    pub payment_status: Option<PaymentStatus>,
}

// -- Handlers --

/// POST /orders: turn the caller's cart into an order.
///
/// Creation runs on its own task so that a client hanging up mid-request
/// cannot interrupt the commit pass and its compensation.
#[tracing::instrument(skip(state, identity, req), fields(user_id = %identity.user_id))]
pub async fn create<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderWithItems>), ApiError> {
    validate_shipping(&req.shipping)?;

    let worker = Arc::clone(&state);
    let order = tokio::spawn(async move {
        worker
            .coordinator
            .create_order(identity.user_id, req)
            .await
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Order task failed: {e}")))??;

    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /orders/mine: the caller's orders, newest first.
#[tracing::instrument(skip(state, identity), fields(user_id = %identity.user_id))]
pub async fn mine<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
) -> Result<Json<Vec<OrderWithItems>>, ApiError> {
    let orders = state.store.list_orders_for_user(identity.user_id).await?;
    Ok(Json(orders))
}

/// GET /orders/{id}: one order. Customers only see their own orders.
#[tracing::instrument(skip(state, identity))]
pub async fn get<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<OrderWithItems>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = state
        .store
        .fetch_order_with_items(order_id)
        .await?
        .filter(|o| identity.is_admin() || o.order.user_id == identity.user_id)
        .ok_or_else(|| ApiError::NotFound(format!("Order not found: {order_id}")))?;
    Ok(Json(order))
}

/// GET /admin/orders: every order, newest first.
#[tracing::instrument(skip(state, _admin))]
pub async fn list_all<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _admin: Admin,
) -> Result<Json<Vec<OrderWithItems>>, ApiError> {
    let orders = state.store.list_all_orders().await?;
    Ok(Json(orders))
}

/// PATCH /orders/{id}/status: set the status and optionally the payment status.
#[tracing::instrument(skip(state, admin, req), fields(admin_id = %admin.0.user_id))]
pub async fn update_status<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    admin: Admin,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<Order>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let update = OrderLifecycle::administrative(req.status, req.payment_status);
    let order = state.store.update_order_status(order_id, update).await?;
    tracing::info!(
        %order_id,
        status = %order.status,
        payment_status = %order.payment_status,
        "order status updated"
    );
    Ok(Json(order))
}

// -- Helpers --

pub(crate) fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    id.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid order ID: {e}")))
}

fn validate_shipping(shipping: &ShippingAddress) -> Result<(), ApiError> {
    let checks = [
        ("shippingAddress", &shipping.address, 5),
        ("shippingCity", &shipping.city, 2),
        ("shippingZip", &shipping.zip, 3),
        ("shippingCountry", &shipping.country, 2),
    ];
    for (field, value, min) in checks {
        if value.trim().chars().count() < min {
            return Err(ApiError::BadRequest(format!(
                "{field} must be at least {min} characters"
            )));
        }
    }
    Ok(())
}
