//! Order creation against PostgreSQL.
//!
//! These tests use a shared PostgreSQL container.
//! Run with:
//!
//! ```bash
//! cargo test -p checkout --test postgres_checkout -- --test-threads=1
//! ```

use std::sync::Arc;

use checkout::{CheckoutError, OrderCoordinator};
use common::{Money, ProductId, UserId};
use domain::{CreateOrderRequest, OrderLineRequest, Product, ShippingAddress};
use order_store::{InventoryStore, PostgresOrderStore};
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            PostgresOrderStore::new(temp_pool.clone())
                .run_migrations()
                .await
                .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// A store over cleared tables with SKU-001 ($10) and SKU-002 ($25) seeded.
async fn get_test_store(widget_stock: u32, gadget_stock: u32) -> PostgresOrderStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE order_items, orders, products")
        .execute(&pool)
        .await
        .unwrap();

    let store = PostgresOrderStore::new(pool);
    store
        .upsert_product(Product::new(
            "SKU-001",
            "Widget",
            Money::from_dollars(10),
            widget_stock,
        ))
        .await
        .unwrap();
    store
        .upsert_product(Product::new(
            "SKU-002",
            "Gadget",
            Money::from_cents(2500),
            gadget_stock,
        ))
        .await
        .unwrap();
    store
}

fn request(lines: &[(&str, u32)]) -> CreateOrderRequest {
    CreateOrderRequest::new(
        lines
            .iter()
            .map(|(id, qty)| OrderLineRequest::new(*id, *qty))
            .collect(),
        ShippingAddress::new("1 Main Street", "Springfield", "12345", "US"),
    )
}

async fn stock(store: &PostgresOrderStore, id: &str) -> u32 {
    store
        .get_product(&ProductId::new(id))
        .await
        .unwrap()
        .unwrap()
        .stock
}

async fn row_count(store: &PostgresOrderStore, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(store.pool())
        .await
        .unwrap()
}

#[tokio::test]
#[serial]
async fn order_is_committed_with_lines_in_request_order() {
    let store = get_test_store(5, 4).await;
    let coordinator = OrderCoordinator::new(store.clone());

    let order = coordinator
        .create_order(UserId::new(), request(&[("SKU-002", 1), ("SKU-001", 3)]))
        .await
        .unwrap();

    assert_eq!(order.order.total, Money::from_cents(5500));
    let lines: Vec<&str> = order
        .items
        .iter()
        .map(|d| d.item.product_id.as_str())
        .collect();
    assert_eq!(lines, vec!["SKU-002", "SKU-001"]);
    assert_eq!(stock(&store, "SKU-001").await, 2);
    assert_eq!(stock(&store, "SKU-002").await, 3);
}

#[tokio::test]
#[serial]
async fn failed_commit_rolls_back_stock_and_deletes_header() {
    // Each line passes validation on its own; together they exceed stock, so
    // the second decrement fails inside the transaction.
    let store = get_test_store(3, 4).await;
    let coordinator = OrderCoordinator::new(store.clone());

    let err = coordinator
        .create_order(
            UserId::new(),
            request(&[("SKU-002", 1), ("SKU-001", 2), ("SKU-001", 2)]),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CheckoutError::InsufficientStock {
            available: 1,
            requested: 2,
            ..
        }
    ));
    assert_eq!(stock(&store, "SKU-001").await, 3);
    assert_eq!(stock(&store, "SKU-002").await, 4);
    assert_eq!(row_count(&store, "orders").await, 0);
    assert_eq!(row_count(&store, "order_items").await, 0);
}

#[tokio::test]
#[serial]
async fn concurrent_orders_never_oversell() {
    let store = get_test_store(3, 4).await;
    let coordinator = Arc::new(OrderCoordinator::new(store.clone()));

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..10 {
        let coordinator = Arc::clone(&coordinator);
        tasks.spawn(async move {
            coordinator
                .create_order(UserId::new(), request(&[("SKU-001", 1)]))
                .await
        });
    }

    let mut created = 0;
    while let Some(result) = tasks.join_next().await {
        match result.unwrap() {
            Ok(_) => created += 1,
            Err(e) => assert!(
                matches!(e, CheckoutError::InsufficientStock { .. }),
                "unexpected error: {e}"
            ),
        }
    }

    assert_eq!(created, 3);
    assert_eq!(stock(&store, "SKU-001").await, 0);
    assert_eq!(row_count(&store, "orders").await, 3);
    assert_eq!(row_count(&store, "order_items").await, 3);
}
