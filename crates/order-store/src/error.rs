use common::{OrderId, ProductId};
use domain::DomainError;
use thiserror::Error;

/// Errors that can occur when interacting with the inventory store or the
/// order ledger.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The referenced product does not exist.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The referenced order does not exist (or was deleted).
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// A conditional decrement matched no row because stock is too low.
    #[error(
        "Insufficient stock for product {product_id}: available {available}, requested {requested}"
    )]
    InsufficientStock {
        product_id: ProductId,
        available: u32,
        requested: u32,
    },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored row could not be decoded into the domain model.
    #[error("Decode error: {0}")]
    Decode(#[from] DomainError),

    /// The backend refused the operation.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
