//! Analytics queries over the order ledger.

use chrono::NaiveDate;
use common::Money;
use domain::OrderWithItems;
use order_store::OrderLedger;
use serde::Serialize;

use crate::error::{AnalyticsError, Result};
use crate::rollup::{self, CustomerSummary, DailySales, ProductSales, RevenuePoint};

/// Longest range `sales_between` answers in one call.
pub const MAX_RANGE_DAYS: i64 = 366;

/// Number of orders shown on the dashboard.
pub const RECENT_ORDERS: usize = 5;

/// Headline figures for the admin dashboard.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub today: DailySales,
    pub total_orders: u64,
    /// Sum of the totals of all paid orders.
    pub total_revenue: Money,
    pub recent_orders: Vec<OrderWithItems>,
}

/// Read-only analytics over an [`OrderLedger`].
///
/// Every query reads a fresh snapshot of all orders and computes its rollup
/// in memory; nothing is cached or written back.
pub struct AnalyticsService<S: OrderLedger> {
    ledger: S,
}

impl<S: OrderLedger> AnalyticsService<S> {
    /// Creates a new analytics service.
    pub fn new(ledger: S) -> Self {
        Self { ledger }
    }

    async fn snapshot(&self, query: &'static str) -> Result<Vec<OrderWithItems>> {
        metrics::counter!("analytics_queries_total", "query" => query).increment(1);
        let orders = self.ledger.list_all_orders().await?;
        tracing::debug!(query, orders = orders.len(), "analytics snapshot loaded");
        Ok(orders)
    }

    /// Sales figures of one UTC day.
    pub async fn daily_sales(&self, date: NaiveDate) -> Result<DailySales> {
        let orders = self.snapshot("daily_sales").await?;
        Ok(rollup::daily_sales(&orders, date))
    }

    /// Sales figures for every day from `start` to `end` inclusive.
    pub async fn sales_between(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<DailySales>> {
        if start > end {
            return Err(AnalyticsError::InvalidRange { start, end });
        }
        let days = (end - start).num_days() + 1;
        if days > MAX_RANGE_DAYS {
            return Err(AnalyticsError::RangeTooLong {
                days,
                max: MAX_RANGE_DAYS,
            });
        }

        let orders = self.snapshot("sales_between").await?;
        Ok(rollup::sales_between(&orders, start, end))
    }

    /// Revenue per day for the `days` days ending on `today`.
    pub async fn revenue_by_period(
        &self,
        today: NaiveDate,
        days: u32,
    ) -> Result<Vec<RevenuePoint>> {
        if i64::from(days) > MAX_RANGE_DAYS {
            return Err(AnalyticsError::RangeTooLong {
                days: i64::from(days),
                max: MAX_RANGE_DAYS,
            });
        }
        let orders = self.snapshot("revenue_by_period").await?;
        Ok(rollup::revenue_by_period(&orders, today, days))
    }

    /// The `limit` best selling products by units.
    pub async fn top_selling_products(&self, limit: usize) -> Result<Vec<ProductSales>> {
        let orders = self.snapshot("top_selling_products").await?;
        Ok(rollup::top_selling_products(&orders, limit))
    }

    /// Customer figures over paid orders.
    pub async fn customer_summary(&self) -> Result<CustomerSummary> {
        let orders = self.snapshot("customer_summary").await?;
        Ok(rollup::customer_summary(&orders))
    }

    /// Dashboard figures as of `today`.
    #[tracing::instrument(skip(self))]
    pub async fn dashboard(&self, today: NaiveDate) -> Result<Dashboard> {
        let orders = self.snapshot("dashboard").await?;
        Ok(Dashboard {
            today: rollup::daily_sales(&orders, today),
            total_orders: orders.len() as u64,
            total_revenue: rollup::paid_revenue(&orders),
            recent_orders: rollup::most_recent(&orders, RECENT_ORDERS),
        })
    }
}
