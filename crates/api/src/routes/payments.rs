//! Payment confirmation endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use common::{Money, OrderId};
use domain::{OrderStatus, PaymentStatus};
use order_store::{OrderLedgerExt, OrderStore};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::routes::auth::Identity;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub order_id: OrderId,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    pub order_id: OrderId,
    pub transaction_id: String,
    pub amount: Money,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
}

/// POST /payments: charge an order's total.
///
/// Customers can only pay for their own orders; someone else's order is
/// reported as missing.
#[tracing::instrument(skip(state, identity), fields(user_id = %identity.user_id))]
pub async fn process<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Json(req): Json<PaymentRequest>,
) -> Result<Json<PaymentResponse>, ApiError> {
    if !identity.is_admin() {
        let owned = state
            .store
            .fetch_order(req.order_id)
            .await?
            .is_some_and(|order| order.user_id == identity.user_id);
        if !owned {
            return Err(ApiError::NotFound(format!(
                "Order not found: {}",
                req.order_id
            )));
        }
    }

    let receipt = state.payments.process_payment(req.order_id).await?;

    Ok(Json(PaymentResponse {
        order_id: receipt.order.id,
        transaction_id: receipt.transaction_id,
        amount: receipt.amount,
        status: receipt.order.status,
        payment_status: receipt.order.payment_status,
    }))
}
