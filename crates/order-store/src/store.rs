use async_trait::async_trait;
use common::{OrderId, ProductId, UserId};
use domain::{NewOrder, NewOrderItem, Order, OrderItem, OrderWithItems, Product, StatusUpdate};

use crate::Result;

/// Authoritative product stock counts.
///
/// Stock is only ever mutated through the conditional decrement (and the
/// administrative restock); there is no blind write of a stock value.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Reads a product. Returns `None` if it does not exist.
    async fn get_product(&self, product_id: &ProductId) -> Result<Option<Product>>;

    /// Atomically subtracts `by` from the product's stock if at least `by`
    /// units remain, returning the remaining stock.
    ///
    /// Fails with `InsufficientStock` (and changes nothing) when the stock is
    /// too low at the moment of the write, or `ProductNotFound`.
    async fn decrement_stock(&self, product_id: &ProductId, by: u32) -> Result<u32>;

    /// Adds `by` units of stock, returning the new stock level.
    async fn restock(&self, product_id: &ProductId, by: u32) -> Result<u32>;

    /// Inserts or replaces a product row.
    async fn upsert_product(&self, product: Product) -> Result<Product>;
}

/// Durable storage of order headers and their lines.
#[async_trait]
pub trait OrderLedger: Send + Sync {
    /// Writes a new order header in state (PENDING, PENDING).
    async fn create_order_header(&self, order: NewOrder) -> Result<Order>;

    /// Writes one order line outside of any commit unit.
    ///
    /// Fails with `OrderNotFound` if the order no longer exists.
    async fn create_order_item(&self, item: NewOrderItem) -> Result<OrderItem>;

    /// Deletes an order and all of its lines. Deleting a missing order is a no-op.
    async fn delete_order(&self, order_id: OrderId) -> Result<()>;

    /// Reads an order with its lines and a summary of each line's product.
    async fn fetch_order_with_items(&self, order_id: OrderId) -> Result<Option<OrderWithItems>>;

    /// Sets the status, and the payment status when given.
    async fn update_order_status(&self, order_id: OrderId, update: StatusUpdate) -> Result<Order>;

    /// Applies `update` only if the order is not PAID, checking and writing
    /// in one atomic step.
    ///
    /// Returns the order as it was before the update, or `None` when it was
    /// already paid. Fails with `OrderNotFound` if the order does not exist.
    async fn update_status_if_unpaid(
        &self,
        order_id: OrderId,
        update: StatusUpdate,
    ) -> Result<Option<Order>>;

    /// All orders of one user, newest first.
    async fn list_orders_for_user(&self, user_id: UserId) -> Result<Vec<OrderWithItems>>;

    /// All orders, newest first.
    async fn list_all_orders(&self) -> Result<Vec<OrderWithItems>>;
}

/// A group of line writes and stock decrements that becomes visible as a
/// whole or not at all.
///
/// Dropping a unit without calling [`CommitUnit::commit`] rolls it back.
#[async_trait]
pub trait CommitUnit: Send {
    /// Writes one order line inside the unit.
    async fn create_order_item(&mut self, item: NewOrderItem) -> Result<OrderItem>;

    /// Conditional decrement inside the unit, same contract as
    /// [`InventoryStore::decrement_stock`].
    async fn decrement_stock(&mut self, product_id: &ProductId, by: u32) -> Result<u32>;

    /// Makes every write of the unit durable.
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Discards every write of the unit.
    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// A backend that is both inventory store and order ledger and can group
/// writes across the two into a [`CommitUnit`].
#[async_trait]
pub trait OrderStore: InventoryStore + OrderLedger {
    /// Opens a new commit unit.
    async fn begin_commit(&self) -> Result<Box<dyn CommitUnit>>;
}

/// Extension trait providing convenience methods for order ledgers.
#[async_trait]
pub trait OrderLedgerExt: OrderLedger {
    /// Reads just the order header.
    async fn fetch_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        Ok(self
            .fetch_order_with_items(order_id)
            .await?
            .map(|with_items| with_items.order))
    }

    /// Checks whether an order exists.
    async fn order_exists(&self, order_id: OrderId) -> Result<bool> {
        Ok(self.fetch_order_with_items(order_id).await?.is_some())
    }
}

// Blanket implementation for all OrderLedger implementations
impl<T: OrderLedger + ?Sized> OrderLedgerExt for T {}
