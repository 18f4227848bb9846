use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use common::{Money, OrderId, OrderItemId, ProductId, UserId};
use domain::{
    NewOrder, NewOrderItem, Order, OrderItem, OrderItemDetail, OrderLifecycle, OrderWithItems,
    Product, StatusUpdate,
};

use crate::{
    Result, StoreError,
    store::{CommitUnit, InventoryStore, OrderLedger, OrderStore},
};

/// Injected failures, used by tests to drive the failure paths of callers.
///
/// Countdown faults (`Some(n)`) let `n` calls succeed and fail every call
/// after that.
#[derive(Debug, Default)]
struct Faults {
    fail_header_writes: bool,
    item_writes_before_failure: Option<usize>,
    decrements_before_failure: Option<usize>,
    fail_deletes: bool,
    fail_reads: bool,
    fail_commits: bool,
    stall_decrements: bool,
}

fn trip(countdown: &mut Option<usize>) -> bool {
    match countdown {
        Some(0) => true,
        Some(n) => {
            *n -= 1;
            false
        }
        None => false,
    }
}

fn injected(what: &str) -> StoreError {
    StoreError::Unavailable(format!("injected {what} failure"))
}

#[derive(Debug, Default)]
struct MemoryState {
    products: HashMap<ProductId, Product>,
    /// Insertion order.
    orders: Vec<Order>,
    items: Vec<OrderItem>,
    faults: Faults,
}

impl MemoryState {
    fn insert_item(&mut self, item: NewOrderItem) -> Result<OrderItem> {
        if trip(&mut self.faults.item_writes_before_failure) {
            return Err(injected("order item write"));
        }
        if !self.orders.iter().any(|o| o.id == item.order_id) {
            return Err(StoreError::OrderNotFound(item.order_id));
        }

        let item = OrderItem {
            id: OrderItemId::new(),
            order_id: item.order_id,
            product_id: item.product_id,
            quantity: item.quantity,
            price: item.unit_price,
        };
        self.items.push(item.clone());
        Ok(item)
    }

    fn decrement(&mut self, product_id: &ProductId, by: u32) -> Result<u32> {
        if trip(&mut self.faults.decrements_before_failure) {
            return Err(injected("stock decrement"));
        }
        let product = self
            .products
            .get_mut(product_id)
            .ok_or_else(|| StoreError::ProductNotFound(product_id.clone()))?;

        if product.stock < by {
            metrics::counter!("order_store_decrements_rejected_total", "backend" => "memory")
                .increment(1);
            return Err(StoreError::InsufficientStock {
                product_id: product_id.clone(),
                available: product.stock,
                requested: by,
            });
        }
        product.stock -= by;
        Ok(product.stock)
    }

    fn with_items(&self, order: &Order) -> OrderWithItems {
        let items = self
            .items
            .iter()
            .filter(|item| item.order_id == order.id)
            .map(|item| OrderItemDetail {
                item: item.clone(),
                product: self.products.get(&item.product_id).map(Product::summary),
            })
            .collect();

        OrderWithItems {
            order: order.clone(),
            items,
        }
    }

    fn newest_first<'a>(
        &self,
        orders: impl DoubleEndedIterator<Item = &'a Order>,
    ) -> Vec<OrderWithItems> {
        // Reverse insertion order first so that the stable sort keeps the most
        // recently inserted order ahead on equal timestamps.
        let mut result: Vec<_> = orders.rev().map(|o| self.with_items(o)).collect();
        result.sort_by(|a, b| b.order.created_at.cmp(&a.order.created_at));
        result
    }
}

fn lock(state: &Mutex<MemoryState>) -> MutexGuard<'_, MemoryState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory store implementation for tests and local runs.
///
/// Provides the same interface as the PostgreSQL implementation. Every
/// operation runs under one mutex, which makes the conditional decrement
/// atomic. Writes made inside an open commit unit are visible to other
/// readers before the unit commits.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryOrderStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with the given products.
    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let store = Self::new();
        {
            let mut state = lock(&store.state);
            for product in products {
                state.products.insert(product.id.clone(), product);
            }
        }
        store
    }

    /// Returns the current stock of a product.
    pub fn product_stock(&self, product_id: &ProductId) -> Option<u32> {
        lock(&self.state).products.get(product_id).map(|p| p.stock)
    }

    /// Changes a product's catalog price.
    pub fn set_price(&self, product_id: &ProductId, price: Money) {
        if let Some(product) = lock(&self.state).products.get_mut(product_id) {
            product.price = price;
        }
    }

    /// Removes a product from the catalog.
    pub fn remove_product(&self, product_id: &ProductId) {
        lock(&self.state).products.remove(product_id);
    }

    /// Returns the number of stored order headers.
    pub fn order_count(&self) -> usize {
        lock(&self.state).orders.len()
    }

    /// Returns the number of stored order lines across all orders.
    pub fn item_count(&self) -> usize {
        lock(&self.state).items.len()
    }

    /// Returns the number of stored lines that reference `order_id`.
    pub fn items_for_order(&self, order_id: OrderId) -> usize {
        lock(&self.state)
            .items
            .iter()
            .filter(|item| item.order_id == order_id)
            .count()
    }

    /// Configures order header writes to fail.
    pub fn set_fail_header_writes(&self, fail: bool) {
        lock(&self.state).faults.fail_header_writes = fail;
    }

    /// Lets `successes` order line writes through, then fails the rest.
    pub fn set_fail_item_write_after(&self, successes: Option<usize>) {
        lock(&self.state).faults.item_writes_before_failure = successes;
    }

    /// Lets `successes` stock decrements through, then fails the rest.
    pub fn set_fail_decrement_after(&self, successes: Option<usize>) {
        lock(&self.state).faults.decrements_before_failure = successes;
    }

    /// Configures order deletes to fail.
    pub fn set_fail_deletes(&self, fail: bool) {
        lock(&self.state).faults.fail_deletes = fail;
    }

    /// Configures order reads to fail.
    pub fn set_fail_reads(&self, fail: bool) {
        lock(&self.state).faults.fail_reads = fail;
    }

    /// Configures commit units to fail on commit.
    pub fn set_fail_commits(&self, fail: bool) {
        lock(&self.state).faults.fail_commits = fail;
    }

    /// Makes stock decrements wait forever, to observe caller cancellation.
    pub fn set_stall_decrements(&self, stall: bool) {
        lock(&self.state).faults.stall_decrements = stall;
    }

    async fn stall_if_configured(&self) {
        let stall = lock(&self.state).faults.stall_decrements;
        if stall {
            std::future::pending::<()>().await;
        }
    }
}

#[async_trait]
impl InventoryStore for InMemoryOrderStore {
    async fn get_product(&self, product_id: &ProductId) -> Result<Option<Product>> {
        Ok(lock(&self.state).products.get(product_id).cloned())
    }

    async fn decrement_stock(&self, product_id: &ProductId, by: u32) -> Result<u32> {
        self.stall_if_configured().await;
        lock(&self.state).decrement(product_id, by)
    }

    async fn restock(&self, product_id: &ProductId, by: u32) -> Result<u32> {
        let mut state = lock(&self.state);
        let product = state
            .products
            .get_mut(product_id)
            .ok_or_else(|| StoreError::ProductNotFound(product_id.clone()))?;
        product.stock = product
            .stock
            .checked_add(by)
            .ok_or_else(|| StoreError::Unavailable("stock counter overflow".to_string()))?;
        Ok(product.stock)
    }

    async fn upsert_product(&self, product: Product) -> Result<Product> {
        lock(&self.state)
            .products
            .insert(product.id.clone(), product.clone());
        Ok(product)
    }
}

#[async_trait]
impl OrderLedger for InMemoryOrderStore {
    async fn create_order_header(&self, order: NewOrder) -> Result<Order> {
        let mut state = lock(&self.state);
        if state.faults.fail_header_writes {
            return Err(injected("order header write"));
        }

        let (status, payment_status) = OrderLifecycle::initial();
        let order = Order {
            id: OrderId::new(),
            user_id: order.user_id,
            status,
            payment_status,
            total: order.total,
            shipping: order.shipping,
            created_at: Utc::now(),
        };
        state.orders.push(order.clone());
        Ok(order)
    }

    async fn create_order_item(&self, item: NewOrderItem) -> Result<OrderItem> {
        lock(&self.state).insert_item(item)
    }

    async fn delete_order(&self, order_id: OrderId) -> Result<()> {
        let mut state = lock(&self.state);
        if state.faults.fail_deletes {
            return Err(injected("order delete"));
        }
        state.orders.retain(|o| o.id != order_id);
        state.items.retain(|i| i.order_id != order_id);
        Ok(())
    }

    async fn fetch_order_with_items(&self, order_id: OrderId) -> Result<Option<OrderWithItems>> {
        let state = lock(&self.state);
        if state.faults.fail_reads {
            return Err(injected("order read"));
        }
        Ok(state
            .orders
            .iter()
            .find(|o| o.id == order_id)
            .map(|o| state.with_items(o)))
    }

    async fn update_order_status(&self, order_id: OrderId, update: StatusUpdate) -> Result<Order> {
        let mut state = lock(&self.state);
        let order = state
            .orders
            .iter_mut()
            .find(|o| o.id == order_id)
            .ok_or(StoreError::OrderNotFound(order_id))?;
        order.apply(update);
        Ok(order.clone())
    }

    async fn update_status_if_unpaid(
        &self,
        order_id: OrderId,
        update: StatusUpdate,
    ) -> Result<Option<Order>> {
        let mut state = lock(&self.state);
        let order = state
            .orders
            .iter_mut()
            .find(|o| o.id == order_id)
            .ok_or(StoreError::OrderNotFound(order_id))?;
        if order.is_paid() {
            return Ok(None);
        }
        let previous = order.clone();
        order.apply(update);
        Ok(Some(previous))
    }

    async fn list_orders_for_user(&self, user_id: UserId) -> Result<Vec<OrderWithItems>> {
        let state = lock(&self.state);
        if state.faults.fail_reads {
            return Err(injected("order read"));
        }
        Ok(state.newest_first(state.orders.iter().filter(|o| o.user_id == user_id)))
    }

    async fn list_all_orders(&self) -> Result<Vec<OrderWithItems>> {
        let state = lock(&self.state);
        if state.faults.fail_reads {
            return Err(injected("order read"));
        }
        Ok(state.newest_first(state.orders.iter()))
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn begin_commit(&self) -> Result<Box<dyn CommitUnit>> {
        Ok(Box::new(MemoryCommitUnit {
            store: self.clone(),
            journal: Vec::new(),
            open: true,
        }))
    }
}

#[derive(Debug)]
enum Undo {
    Item(OrderItemId),
    Stock { product_id: ProductId, amount: u32 },
}

/// Commit unit over the in-memory store, backed by an undo journal.
#[derive(Debug)]
struct MemoryCommitUnit {
    store: InMemoryOrderStore,
    journal: Vec<Undo>,
    open: bool,
}

impl MemoryCommitUnit {
    fn undo(&mut self) {
        let mut state = lock(&self.store.state);
        for entry in self.journal.drain(..).rev() {
            match entry {
                Undo::Item(id) => state.items.retain(|item| item.id != id),
                Undo::Stock { product_id, amount } => {
                    if let Some(product) = state.products.get_mut(&product_id) {
                        product.stock += amount;
                    }
                }
            }
        }
        self.open = false;
    }
}

impl Drop for MemoryCommitUnit {
    fn drop(&mut self) {
        if self.open {
            tracing::debug!(
                pending = self.journal.len(),
                "commit unit dropped while open, rolling back"
            );
            self.undo();
        }
    }
}

#[async_trait]
impl CommitUnit for MemoryCommitUnit {
    async fn create_order_item(&mut self, item: NewOrderItem) -> Result<OrderItem> {
        let item = lock(&self.store.state).insert_item(item)?;
        self.journal.push(Undo::Item(item.id));
        Ok(item)
    }

    async fn decrement_stock(&mut self, product_id: &ProductId, by: u32) -> Result<u32> {
        self.store.stall_if_configured().await;
        let remaining = lock(&self.store.state).decrement(product_id, by)?;
        self.journal.push(Undo::Stock {
            product_id: product_id.clone(),
            amount: by,
        });
        Ok(remaining)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let mut unit = self;
        if lock(&unit.store.state).faults.fail_commits {
            // Dropping the unit rolls it back.
            return Err(injected("commit"));
        }
        unit.journal.clear();
        unit.open = false;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let mut unit = self;
        unit.undo();
        Ok(())
    }
}
