use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use common::{Money, OrderId, OrderItemId, ProductId, UserId};
use domain::{
    DomainError, NewOrder, NewOrderItem, Order, OrderItem, OrderItemDetail, OrderLifecycle,
    OrderStatus, OrderWithItems, PaymentStatus, Product, ProductSummary, ShippingAddress,
    StatusUpdate,
};
use sqlx::{PgConnection, PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Result, StoreError,
    store::{CommitUnit, InventoryStore, OrderLedger, OrderStore},
};

const ORDER_COLUMNS: &str = "id, user_id, status, payment_status, total_cents, \
     shipping_address, shipping_city, shipping_zip, shipping_country, created_at";

const ITEM_SELECT: &str = r#"
    SELECT i.id, i.order_id, i.product_id, i.quantity, i.price_cents,
           p.name AS product_name, p.price_cents AS product_price_cents
    FROM order_items i
    LEFT JOIN products p ON p.id = i.product_id
"#;

/// PostgreSQL-backed inventory store and order ledger.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn items_for(&self, order_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<OrderItemDetail>>> {
        let sql = format!(
            "{ITEM_SELECT} WHERE i.order_id = ANY($1) ORDER BY i.order_id, i.position"
        );
        let rows = sqlx::query(&sql)
            .bind(order_ids)
            .fetch_all(&self.pool)
            .await?;

        let mut grouped: HashMap<Uuid, Vec<OrderItemDetail>> = HashMap::new();
        for row in rows {
            let order_id: Uuid = row.try_get("order_id")?;
            grouped
                .entry(order_id)
                .or_default()
                .push(row_to_item_detail(&row)?);
        }
        Ok(grouped)
    }

    async fn orders_with_items(&self, rows: Vec<PgRow>) -> Result<Vec<OrderWithItems>> {
        let orders = rows
            .iter()
            .map(row_to_order)
            .collect::<Result<Vec<_>>>()?;
        let ids: Vec<Uuid> = orders.iter().map(|o| o.id.as_uuid()).collect();
        let mut items = self.items_for(&ids).await?;

        Ok(orders
            .into_iter()
            .map(|order| {
                let items = items.remove(&order.id.as_uuid()).unwrap_or_default();
                OrderWithItems { order, items }
            })
            .collect())
    }
}

fn to_u32(field: &'static str, value: i64) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::Decode(DomainError::OutOfRange { field, value }))
}

fn row_to_product(row: &PgRow) -> Result<Product> {
    Ok(Product {
        id: ProductId::new(row.try_get::<String, _>("id")?),
        name: row.try_get("name")?,
        price: Money::from_cents(row.try_get("price_cents")?),
        stock: to_u32("stock", row.try_get("stock")?)?,
    })
}

fn row_to_order(row: &PgRow) -> Result<Order> {
    Ok(Order {
        id: OrderId::from_uuid(row.try_get("id")?),
        user_id: UserId::from_uuid(row.try_get("user_id")?),
        status: row.try_get::<String, _>("status")?.parse::<OrderStatus>()?,
        payment_status: row
            .try_get::<String, _>("payment_status")?
            .parse::<PaymentStatus>()?,
        total: Money::from_cents(row.try_get("total_cents")?),
        shipping: ShippingAddress {
            address: row.try_get("shipping_address")?,
            city: row.try_get("shipping_city")?,
            zip: row.try_get("shipping_zip")?,
            country: row.try_get("shipping_country")?,
        },
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_item(row: &PgRow) -> Result<OrderItem> {
    Ok(OrderItem {
        id: OrderItemId::from_uuid(row.try_get("id")?),
        order_id: OrderId::from_uuid(row.try_get("order_id")?),
        product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
        quantity: to_u32("quantity", row.try_get("quantity")?)?,
        price: Money::from_cents(row.try_get("price_cents")?),
    })
}

fn row_to_item_detail(row: &PgRow) -> Result<OrderItemDetail> {
    let item = row_to_item(row)?;
    let name: Option<String> = row.try_get("product_name")?;
    let price: Option<i64> = row.try_get("product_price_cents")?;

    let product = match (name, price) {
        (Some(name), Some(price)) => Some(ProductSummary {
            id: item.product_id.clone(),
            name,
            price: Money::from_cents(price),
        }),
        _ => None,
    };
    Ok(OrderItemDetail { item, product })
}

/// Inserts one order line, mapping a missing parent order to `OrderNotFound`.
async fn insert_item(conn: &mut PgConnection, item: NewOrderItem) -> Result<OrderItem> {
    let order_id = item.order_id;
    let row = sqlx::query(
        r#"
        INSERT INTO order_items (id, order_id, product_id, quantity, price_cents)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, order_id, product_id, quantity, price_cents
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(order_id.as_uuid())
    .bind(item.product_id.as_str())
    .bind(i64::from(item.quantity))
    .bind(item.unit_price.cents())
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_foreign_key_violation()
        {
            return StoreError::OrderNotFound(order_id);
        }
        StoreError::Database(e)
    })?;

    row_to_item(&row)
}

/// Conditional decrement: only touches the row when enough stock remains.
async fn decrement(conn: &mut PgConnection, product_id: &ProductId, by: u32) -> Result<u32> {
    let remaining: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE products SET stock = stock - $2
        WHERE id = $1 AND stock >= $2
        RETURNING stock
        "#,
    )
    .bind(product_id.as_str())
    .bind(i64::from(by))
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(remaining) = remaining {
        return to_u32("stock", remaining);
    }

    // Zero rows affected: tell a missing product apart from a lost race.
    let available: Option<i64> = sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
        .bind(product_id.as_str())
        .fetch_optional(&mut *conn)
        .await?;

    match available {
        None => Err(StoreError::ProductNotFound(product_id.clone())),
        Some(available) => {
            metrics::counter!("order_store_decrements_rejected_total", "backend" => "postgres")
                .increment(1);
            Err(StoreError::InsufficientStock {
                product_id: product_id.clone(),
                available: to_u32("stock", available)?,
                requested: by,
            })
        }
    }
}

#[async_trait]
impl InventoryStore for PostgresOrderStore {
    async fn get_product(&self, product_id: &ProductId) -> Result<Option<Product>> {
        let row = sqlx::query("SELECT id, name, price_cents, stock FROM products WHERE id = $1")
            .bind(product_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_product).transpose()
    }

    async fn decrement_stock(&self, product_id: &ProductId, by: u32) -> Result<u32> {
        let mut conn = self.pool.acquire().await?;
        decrement(&mut conn, product_id, by).await
    }

    async fn restock(&self, product_id: &ProductId, by: u32) -> Result<u32> {
        let stock: Option<i64> = sqlx::query_scalar(
            "UPDATE products SET stock = stock + $2 WHERE id = $1 RETURNING stock",
        )
        .bind(product_id.as_str())
        .bind(i64::from(by))
        .fetch_optional(&self.pool)
        .await?;

        match stock {
            Some(stock) => to_u32("stock", stock),
            None => Err(StoreError::ProductNotFound(product_id.clone())),
        }
    }

    async fn upsert_product(&self, product: Product) -> Result<Product> {
        let row = sqlx::query(
            r#"
            INSERT INTO products (id, name, price_cents, stock)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                price_cents = EXCLUDED.price_cents,
                stock = EXCLUDED.stock
            RETURNING id, name, price_cents, stock
            "#,
        )
        .bind(product.id.as_str())
        .bind(&product.name)
        .bind(product.price.cents())
        .bind(i64::from(product.stock))
        .fetch_one(&self.pool)
        .await?;

        row_to_product(&row)
    }
}

#[async_trait]
impl OrderLedger for PostgresOrderStore {
    async fn create_order_header(&self, order: NewOrder) -> Result<Order> {
        let (status, payment_status) = OrderLifecycle::initial();
        let sql = format!(
            "INSERT INTO orders ({ORDER_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {ORDER_COLUMNS}"
        );

        let row = sqlx::query(&sql)
            .bind(Uuid::new_v4())
            .bind(order.user_id.as_uuid())
            .bind(status.as_str())
            .bind(payment_status.as_str())
            .bind(order.total.cents())
            .bind(&order.shipping.address)
            .bind(&order.shipping.city)
            .bind(&order.shipping.zip)
            .bind(&order.shipping.country)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await?;

        row_to_order(&row)
    }

    async fn create_order_item(&self, item: NewOrderItem) -> Result<OrderItem> {
        let mut conn = self.pool.acquire().await?;
        insert_item(&mut conn, item).await
    }

    async fn delete_order(&self, order_id: OrderId) -> Result<()> {
        // order_items rows go with it (ON DELETE CASCADE).
        sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(order_id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn fetch_order_with_items(&self, order_id: OrderId) -> Result<Option<OrderWithItems>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(order_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(self.orders_with_items(vec![row]).await?.into_iter().next()),
            None => Ok(None),
        }
    }

    async fn update_order_status(&self, order_id: OrderId, update: StatusUpdate) -> Result<Order> {
        let sql = format!(
            "UPDATE orders SET status = $2, payment_status = COALESCE($3, payment_status) \
             WHERE id = $1 RETURNING {ORDER_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(order_id.as_uuid())
            .bind(update.status.as_str())
            .bind(update.payment_status.map(|s| s.as_str()))
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => row_to_order(&row),
            None => Err(StoreError::OrderNotFound(order_id)),
        }
    }

    async fn update_status_if_unpaid(
        &self,
        order_id: OrderId,
        update: StatusUpdate,
    ) -> Result<Option<Order>> {
        let mut tx = self.pool.begin().await?;

        // The row lock makes a concurrent caller wait here and then see PAID.
        let select = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE");
        let row = sqlx::query(&select)
            .bind(order_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::OrderNotFound(order_id))?;
        let previous = row_to_order(&row)?;
        if previous.is_paid() {
            return Ok(None);
        }

        sqlx::query(
            "UPDATE orders SET status = $2, payment_status = COALESCE($3, payment_status) \
             WHERE id = $1",
        )
        .bind(order_id.as_uuid())
        .bind(update.status.as_str())
        .bind(update.payment_status.map(|s| s.as_str()))
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(Some(previous))
    }

    async fn list_orders_for_user(&self, user_id: UserId) -> Result<Vec<OrderWithItems>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id"
        );
        let rows = sqlx::query(&sql)
            .bind(user_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;

        self.orders_with_items(rows).await
    }

    async fn list_all_orders(&self) -> Result<Vec<OrderWithItems>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC, id");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        self.orders_with_items(rows).await
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn begin_commit(&self) -> Result<Box<dyn CommitUnit>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgCommitUnit { tx }))
    }
}

/// Commit unit backed by a database transaction.
///
/// Dropping the transaction without committing rolls it back.
struct PgCommitUnit {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl CommitUnit for PgCommitUnit {
    async fn create_order_item(&mut self, item: NewOrderItem) -> Result<OrderItem> {
        insert_item(&mut self.tx, item).await
    }

    async fn decrement_stock(&mut self, product_id: &ProductId, by: u32) -> Result<u32> {
        decrement(&mut self.tx, product_id, by).await
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
