//! Admin analytics endpoints.

use std::sync::Arc;

use analytics::{CustomerSummary, DailySales, Dashboard, ProductSales, RevenuePoint};
use axum::Json;
use axum::extract::{Query, State};
use chrono::{NaiveDate, Utc};
use order_store::OrderStore;
use serde::Deserialize;

use crate::error::ApiError;
use crate::routes::auth::Admin;
use crate::state::AppState;

const DEFAULT_TOP_PRODUCTS: usize = 10;
const DEFAULT_REVENUE_DAYS: u32 = 30;

#[derive(Debug, Deserialize)]
pub struct SalesQuery {
    #[serde(alias = "startDate")]
    pub start: Option<NaiveDate>,
    #[serde(alias = "endDate")]
    pub end: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct TopProductsQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct RevenueQuery {
    pub days: Option<u32>,
}

/// GET /analytics/dashboard
#[tracing::instrument(skip(state, _admin))]
pub async fn dashboard<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _admin: Admin,
) -> Result<Json<Dashboard>, ApiError> {
    let today = Utc::now().date_naive();
    Ok(Json(state.analytics.dashboard(today).await?))
}

/// GET /analytics/sales?start=YYYY-MM-DD&end=YYYY-MM-DD
#[tracing::instrument(skip(state, _admin))]
pub async fn sales<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _admin: Admin,
    Query(query): Query<SalesQuery>,
) -> Result<Json<Vec<DailySales>>, ApiError> {
    let (Some(start), Some(end)) = (query.start, query.end) else {
        return Err(ApiError::BadRequest(
            "Start date and end date are required".to_string(),
        ));
    };
    Ok(Json(state.analytics.sales_between(start, end).await?))
}

/// GET /analytics/revenue?days=N
#[tracing::instrument(skip(state, _admin))]
pub async fn revenue<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _admin: Admin,
    Query(query): Query<RevenueQuery>,
) -> Result<Json<Vec<RevenuePoint>>, ApiError> {
    let days = query.days.filter(|d| *d > 0).unwrap_or(DEFAULT_REVENUE_DAYS);
    let today = Utc::now().date_naive();
    Ok(Json(state.analytics.revenue_by_period(today, days).await?))
}

/// GET /analytics/top-products?limit=N
#[tracing::instrument(skip(state, _admin))]
pub async fn top_products<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _admin: Admin,
    Query(query): Query<TopProductsQuery>,
) -> Result<Json<Vec<ProductSales>>, ApiError> {
    let limit = query
        .limit
        .filter(|l| *l > 0)
        .unwrap_or(DEFAULT_TOP_PRODUCTS);
    Ok(Json(state.analytics.top_selling_products(limit).await?))
}

/// GET /analytics/customers
#[tracing::instrument(skip(state, _admin))]
pub async fn customers<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _admin: Admin,
) -> Result<Json<CustomerSummary>, ApiError> {
    Ok(Json(state.analytics.customer_summary().await?))
}
