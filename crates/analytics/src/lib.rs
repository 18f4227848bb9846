//! Sales and customer analytics for the order/inventory core.
//!
//! This crate provides:
//! - Pure rollups over a slice of orders in [`rollup`]
//! - [`AnalyticsService`], which loads orders from an order ledger and
//!   applies the rollups

pub mod error;
pub mod rollup;
pub mod service;

pub use error::{AnalyticsError, Result};
pub use rollup::{CustomerSummary, DailySales, ProductSales, RevenuePoint};
pub use service::{AnalyticsService, Dashboard, MAX_RANGE_DAYS, RECENT_ORDERS};
