//! Persisted order records.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, OrderItemId, ProductId, UserId};
use serde::{Deserialize, Serialize};

use crate::lifecycle::StatusUpdate;
use crate::product::ProductSummary;

use super::{OrderStatus, PaymentStatus, ShippingAddress};

/// An order header.
///
/// `total` is the snapshot computed at creation and is never re-derived from
/// live product prices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub total: Money,
    #[serde(flatten)]
    pub shipping: ShippingAddress,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Applies a status update in place.
    ///
    /// `payment_status` is left untouched when the update omits it.
    pub fn apply(&mut self, update: StatusUpdate) {
        self.status = update.status;
        if let Some(payment_status) = update.payment_status {
            self.payment_status = payment_status;
        }
    }

    /// Returns true if the order has been paid.
    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }
}

/// Everything needed to write a new order header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub user_id: UserId,
    pub total: Money,
    pub shipping: ShippingAddress,
}

/// A persisted order line. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: u32,
    /// Unit price at the time the order was placed.
    pub price: Money,
}

impl OrderItem {
    /// Returns `price * quantity`, saturating on overflow.
    pub fn line_total(&self) -> Money {
        self.price
            .checked_multiply(self.quantity)
            .unwrap_or(Money::from_cents(i64::MAX))
    }
}

/// Everything needed to write a new order line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
}

/// An order line together with a summary of the product it references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItemDetail {
    #[serde(flatten)]
    pub item: OrderItem,
    /// `None` when the product no longer exists in the catalog.
    pub product: Option<ProductSummary>,
}

/// An order header with all of its lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItemDetail>,
}

impl OrderWithItems {
    pub fn id(&self) -> OrderId {
        self.order.id
    }

    /// Total units across all lines.
    pub fn item_count(&self) -> u64 {
        self.items.iter().map(|d| u64::from(d.item.quantity)).sum()
    }
}
