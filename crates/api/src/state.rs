//! Shared application state and the demo catalog.

use analytics::AnalyticsService;
use checkout::{InMemoryPaymentGateway, OrderCoordinator, PaymentProcessor};
use common::Money;
use domain::Product;
use order_store::{InventoryStore, OrderStore, StoreError};

/// Shared application state accessible from all handlers.
pub struct AppState<S: OrderStore + Clone + 'static> {
    pub store: S,
    pub coordinator: OrderCoordinator<S>,
    pub payments: PaymentProcessor<S, InMemoryPaymentGateway>,
    pub analytics: AnalyticsService<S>,
    /// Name of the storage backend, reported by `/health`.
    pub backend: &'static str,
}

impl<S: OrderStore + Clone + 'static> AppState<S> {
    /// Wires every service to the same store.
    pub fn new(store: S, gateway: InMemoryPaymentGateway, backend: &'static str) -> Self {
        Self {
            coordinator: OrderCoordinator::new(store.clone()),
            payments: PaymentProcessor::new(store.clone(), gateway),
            analytics: AnalyticsService::new(store.clone()),
            store,
            backend,
        }
    }
}

/// Products loaded into the in-memory store at startup.
pub fn demo_products() -> Vec<Product> {
    vec![
        Product::new("SKU-001", "Widget", Money::from_dollars(10), 100),
        Product::new("SKU-002", "Gadget", Money::from_cents(2500), 50),
        Product::new("SKU-003", "Gizmo", Money::from_cents(499), 250),
        Product::new("SKU-004", "Doohickey", Money::from_cents(12_999), 5),
    ]
}

/// Writes the demo products into `store`.
pub async fn seed_demo_catalog<S: InventoryStore>(store: &S) -> Result<usize, StoreError> {
    let products = demo_products();
    let count = products.len();
    for product in products {
        store.upsert_product(product).await?;
    }
    tracing::info!(products = count, "demo catalog seeded");
    Ok(count)
}
