//! Pure rollups over a snapshot of orders.

use std::collections::{HashMap, HashSet};

use chrono::{Days, NaiveDate};
use common::{Money, ProductId, UserId};
use domain::{OrderWithItems, PaymentStatus};
use serde::Serialize;

/// Sales figures for one UTC calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySales {
    pub date: NaiveDate,
    pub total_orders: u64,
    /// Sum of order totals, paid or not.
    pub total_revenue: Money,
    pub total_items_sold: u64,
    pub average_order_value: Money,
    /// Customers whose first order falls on this day.
    pub new_customers: u64,
    /// Customers who also ordered before this day.
    pub returning_customers: u64,
}

/// Revenue and order count for one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenuePoint {
    pub date: NaiveDate,
    pub total_revenue: Money,
    pub total_orders: u64,
}

/// Units sold and revenue of one product across all orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSales {
    pub product_id: ProductId,
    /// `None` when the product is no longer in the catalog.
    pub name: Option<String>,
    pub total_quantity: u64,
    /// Computed from the unit price stored on each line.
    pub total_revenue: Money,
}

/// Figures over paid orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerSummary {
    /// Distinct customers with at least one paid order.
    pub active_customers: u64,
    pub paid_orders: u64,
    pub average_order_value: Money,
}

/// Computes the sales figures of a single day.
pub fn daily_sales(orders: &[OrderWithItems], date: NaiveDate) -> DailySales {
    let todays: Vec<&OrderWithItems> = orders
        .iter()
        .filter(|o| o.order.created_at.date_naive() == date)
        .collect();

    let total_orders = todays.len() as u64;
    let total_revenue: Money = todays.iter().map(|o| o.order.total).sum();
    let total_items_sold = todays.iter().map(|o| o.item_count()).sum();

    let customers: HashSet<UserId> = todays.iter().map(|o| o.order.user_id).collect();
    let returning: HashSet<UserId> = orders
        .iter()
        .filter(|o| o.order.created_at.date_naive() < date)
        .map(|o| o.order.user_id)
        .filter(|user| customers.contains(user))
        .collect();

    let returning_customers = returning.len() as u64;
    DailySales {
        date,
        total_orders,
        total_revenue,
        total_items_sold,
        average_order_value: total_revenue.average_over(total_orders),
        new_customers: customers.len() as u64 - returning_customers,
        returning_customers,
    }
}

/// Computes one [`DailySales`] per day from `start` to `end` inclusive.
///
/// Returns an empty list when `start` is after `end`.
pub fn sales_between(
    orders: &[OrderWithItems],
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<DailySales> {
    date_range(start, end)
        .map(|date| daily_sales(orders, date))
        .collect()
}

/// Revenue per day for the `days` days ending on `today`, oldest first.
///
/// Returns an empty list when `days` is zero.
pub fn revenue_by_period(
    orders: &[OrderWithItems],
    today: NaiveDate,
    days: u32,
) -> Vec<RevenuePoint> {
    let Some(span) = days.checked_sub(1) else {
        return Vec::new();
    };
    let start = today
        .checked_sub_days(Days::new(u64::from(span)))
        .unwrap_or(NaiveDate::MIN);

    date_range(start, today)
        .map(|date| {
            let day: Vec<_> = orders
                .iter()
                .filter(|o| o.order.created_at.date_naive() == date)
                .collect();
            RevenuePoint {
                date,
                total_revenue: day.iter().map(|o| o.order.total).sum(),
                total_orders: day.len() as u64,
            }
        })
        .collect()
}

/// The `limit` products with the most units sold.
///
/// Ties are broken by product ID.
pub fn top_selling_products(orders: &[OrderWithItems], limit: usize) -> Vec<ProductSales> {
    let mut by_product: HashMap<&ProductId, ProductSales> = HashMap::new();

    for detail in orders.iter().flat_map(|o| &o.items) {
        let entry = by_product
            .entry(&detail.item.product_id)
            .or_insert_with(|| ProductSales {
                product_id: detail.item.product_id.clone(),
                name: None,
                total_quantity: 0,
                total_revenue: Money::zero(),
            });
        if entry.name.is_none() {
            entry.name = detail.product.as_ref().map(|p| p.name.clone());
        }
        entry.total_quantity += u64::from(detail.item.quantity);
        entry.total_revenue += detail.item.line_total();
    }

    let mut products: Vec<ProductSales> = by_product.into_values().collect();
    products.sort_by(|a, b| {
        b.total_quantity
            .cmp(&a.total_quantity)
            .then_with(|| a.product_id.cmp(&b.product_id))
    });
    products.truncate(limit);
    products
}

/// Customer figures over orders whose payment status is PAID.
pub fn customer_summary(orders: &[OrderWithItems]) -> CustomerSummary {
    let paid: Vec<_> = paid_orders(orders).collect();
    let active: HashSet<UserId> = paid.iter().map(|o| o.order.user_id).collect();
    let revenue: Money = paid.iter().map(|o| o.order.total).sum();

    CustomerSummary {
        active_customers: active.len() as u64,
        paid_orders: paid.len() as u64,
        average_order_value: revenue.average_over(paid.len() as u64),
    }
}

/// Sum of the totals of all paid orders.
pub fn paid_revenue(orders: &[OrderWithItems]) -> Money {
    paid_orders(orders).map(|o| o.order.total).sum()
}

/// The `limit` most recently created orders, newest first.
pub fn most_recent(orders: &[OrderWithItems], limit: usize) -> Vec<OrderWithItems> {
    let mut recent: Vec<&OrderWithItems> = orders.iter().collect();
    recent.sort_by(|a, b| b.order.created_at.cmp(&a.order.created_at));
    recent.into_iter().take(limit).cloned().collect()
}

fn paid_orders(orders: &[OrderWithItems]) -> impl Iterator<Item = &OrderWithItems> {
    orders
        .iter()
        .filter(|o| o.order.payment_status == PaymentStatus::Paid)
}

fn date_range(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take_while(move |date| *date <= end)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use common::{OrderId, OrderItemId};
    use domain::{Order, OrderItem, OrderItemDetail, OrderStatus, ProductSummary, ShippingAddress};

    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn line(product: &str, quantity: u32, cents: i64) -> OrderItemDetail {
        OrderItemDetail {
            item: OrderItem {
                id: OrderItemId::new(),
                order_id: OrderId::new(),
                product_id: ProductId::new(product),
                quantity,
                price: Money::from_cents(cents),
            },
            product: Some(ProductSummary {
                id: ProductId::new(product),
                name: format!("{product} name"),
                price: Money::from_cents(cents.saturating_mul(2)),
            }),
        }
    }

    fn order(
        user: UserId,
        day: u32,
        hour: u32,
        payment_status: PaymentStatus,
        items: Vec<OrderItemDetail>,
    ) -> OrderWithItems {
        let total = items.iter().map(|d| d.item.line_total()).sum();
        OrderWithItems {
            order: Order {
                id: OrderId::new(),
                user_id: user,
                status: OrderStatus::Pending,
                payment_status,
                total,
                shipping: ShippingAddress::new("1 Main Street", "Springfield", "12345", "US"),
                created_at: Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap(),
            },
            items,
        }
    }

    fn sample() -> (UserId, UserId, Vec<OrderWithItems>) {
        let alice = UserId::new();
        let bob = UserId::new();
        let orders = vec![
            order(alice, 1, 9, PaymentStatus::Paid, vec![line("A", 2, 500)]),
            order(alice, 2, 10, PaymentStatus::Pending, vec![line("B", 1, 1000)]),
            order(
                bob,
                2,
                23,
                PaymentStatus::Paid,
                vec![line("A", 3, 500), line("B", 1, 1000)],
            ),
        ];
        (alice, bob, orders)
    }

    #[test]
    fn test_daily_sales_splits_new_and_returning() {
        let (_, _, orders) = sample();

        let day = daily_sales(&orders, date(2));
        assert_eq!(day.total_orders, 2);
        assert_eq!(day.total_revenue, Money::from_cents(3500));
        assert_eq!(day.total_items_sold, 5);
        assert_eq!(day.average_order_value, Money::from_cents(1750));
        assert_eq!(day.returning_customers, 1);
        assert_eq!(day.new_customers, 1);
    }

    #[test]
    fn test_daily_sales_of_empty_day() {
        let (_, _, orders) = sample();
        let day = daily_sales(&orders, date(20));
        assert_eq!(day.total_orders, 0);
        assert_eq!(day.average_order_value, Money::zero());
        assert_eq!(day.new_customers, 0);
    }

    #[test]
    fn test_sales_between_is_inclusive() {
        let (_, _, orders) = sample();

        let range = sales_between(&orders, date(1), date(3));
        assert_eq!(range.len(), 3);
        assert_eq!(range[0].total_orders, 1);
        assert_eq!(range[1].total_orders, 2);
        assert_eq!(range[2].total_orders, 0);

        assert!(sales_between(&orders, date(3), date(1)).is_empty());
    }

    #[test]
    fn test_revenue_by_period() {
        let (_, _, orders) = sample();

        let points = revenue_by_period(&orders, date(2), 2);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].date, date(1));
        assert_eq!(points[0].total_revenue, Money::from_cents(1000));
        assert_eq!(points[1].total_orders, 2);
    }

    #[test]
    fn test_revenue_by_period_of_zero_days_is_empty() {
        let (_, _, orders) = sample();
        assert!(revenue_by_period(&orders, date(2), 0).is_empty());
        assert_eq!(revenue_by_period(&orders, date(2), 1).len(), 1);
    }

    #[test]
    fn test_revenue_near_the_money_limit_saturates() {
        let alice = UserId::new();
        let bob = UserId::new();
        let huge = i64::MAX / 2 + 1;
        let orders = vec![
            order(alice, 1, 9, PaymentStatus::Paid, vec![line("A", 1, huge)]),
            order(bob, 1, 10, PaymentStatus::Paid, vec![line("A", 1, huge)]),
        ];
        let max = Money::from_cents(i64::MAX);

        assert_eq!(daily_sales(&orders, date(1)).total_revenue, max);
        assert_eq!(paid_revenue(&orders), max);
        assert_eq!(revenue_by_period(&orders, date(1), 1)[0].total_revenue, max);
        assert_eq!(top_selling_products(&orders, 1)[0].total_revenue, max);

        let summary = customer_summary(&orders);
        assert_eq!(summary.paid_orders, 2);
        assert_eq!(summary.average_order_value, Money::from_cents(i64::MAX / 2));
    }

    #[test]
    fn test_top_products_by_quantity_with_snapshot_revenue() {
        let (_, _, orders) = sample();

        let top = top_selling_products(&orders, 10);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].product_id, ProductId::new("A"));
        assert_eq!(top[0].total_quantity, 5);
        // Line prices, not the current catalog price.
        assert_eq!(top[0].total_revenue, Money::from_cents(2500));
        assert_eq!(top[0].name.as_deref(), Some("A name"));
        assert_eq!(top[1].total_quantity, 2);

        assert_eq!(top_selling_products(&orders, 1).len(), 1);
    }

    #[test]
    fn test_customer_summary_counts_paid_orders_only() {
        let (_, _, orders) = sample();

        let summary = customer_summary(&orders);
        assert_eq!(summary.active_customers, 2);
        assert_eq!(summary.paid_orders, 2);
        assert_eq!(summary.average_order_value, Money::from_cents(1750));
        assert_eq!(paid_revenue(&orders), Money::from_cents(3500));
    }

    #[test]
    fn test_most_recent() {
        let (_, bob, orders) = sample();
        let recent = most_recent(&orders, 1);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].order.user_id, bob);
    }

    #[test]
    fn test_daily_sales_serializes_camel_case() {
        let (_, _, orders) = sample();
        let json = serde_json::to_value(daily_sales(&orders, date(1))).unwrap();
        assert_eq!(json["date"], "2024-03-01");
        assert_eq!(json["totalOrders"], 1);
        assert!(json.get("averageOrderValue").is_some());
    }
}
