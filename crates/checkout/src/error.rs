//! Checkout error types.

use common::{OrderId, ProductId};
use order_store::StoreError;
use thiserror::Error;

/// The step of order creation an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Reading products and pricing the lines.
    Validation,
    /// Writing the order header.
    HeaderWrite,
    /// Writing an order line.
    ItemWrite,
    /// Decrementing a product's stock.
    StockDecrement,
    /// Opening or committing the commit unit.
    Commit,
    /// Reading the finished order back.
    ReadBack,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Validation => "validation",
            Phase::HeaderWrite => "header_write",
            Phase::ItemWrite => "item_write",
            Phase::StockDecrement => "stock_decrement",
            Phase::Commit => "commit",
            Phase::ReadBack => "read_back",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by order creation.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The request has no lines.
    #[error("Order has no items")]
    EmptyOrder,

    /// A line asks for zero units.
    #[error("Invalid quantity {quantity} for product {product_id} (must be at least 1)")]
    InvalidQuantity { product_id: ProductId, quantity: u32 },

    /// A line references a product that does not exist.
    #[error("Product with ID {0} not found")]
    ProductNotFound(ProductId),

    /// A line asks for more units than are in stock.
    #[error(
        "Insufficient stock for product {product_id}: available {available}, requested {requested}"
    )]
    InsufficientStock {
        product_id: ProductId,
        available: u32,
        requested: u32,
    },

    /// The order total does not fit in the money type.
    #[error("Order total is too large")]
    TotalOverflow,

    /// The store failed during the given phase.
    #[error("Persistence error during {phase}: {detail}")]
    Persistence { phase: Phase, detail: String },

    /// The caller cancelled order creation.
    #[error("Order creation cancelled during {phase}")]
    Cancelled { phase: Phase },

    /// The compensating delete after a failed commit pass itself failed.
    ///
    /// The order may exist with inconsistent lines and needs reconciliation.
    #[error("Compensation failed for order {order_id} after '{original}': {detail}")]
    CompensationFailed {
        order_id: OrderId,
        original: Box<CheckoutError>,
        detail: String,
    },
}

impl CheckoutError {
    pub(crate) fn persistence(phase: Phase, err: StoreError) -> Self {
        CheckoutError::Persistence {
            phase,
            detail: err.to_string(),
        }
    }

    /// Returns true if the request itself must change before a retry can
    /// succeed.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            CheckoutError::EmptyOrder
                | CheckoutError::InvalidQuantity { .. }
                | CheckoutError::ProductNotFound(_)
                | CheckoutError::InsufficientStock { .. }
                | CheckoutError::TotalOverflow
        )
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            CheckoutError::EmptyOrder => "empty_order",
            CheckoutError::InvalidQuantity { .. } => "invalid_quantity",
            CheckoutError::ProductNotFound(_) => "product_not_found",
            CheckoutError::InsufficientStock { .. } => "insufficient_stock",
            CheckoutError::TotalOverflow => "total_overflow",
            CheckoutError::Persistence { .. } => "persistence",
            CheckoutError::Cancelled { .. } => "cancelled",
            CheckoutError::CompensationFailed { .. } => "compensation_failed",
        }
    }
}

/// Errors returned by payment confirmation.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The order does not exist.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The order was already paid.
    #[error("Order {0} is already paid")]
    AlreadyPaid(OrderId),

    /// The gateway declined the charge. The order is marked FAILED.
    #[error("Payment for order {order_id} declined: {reason}")]
    Declined { order_id: OrderId, reason: String },

    /// The gateway could not be reached or answered with an error.
    #[error("Payment gateway error: {0}")]
    Gateway(String),

    /// Store error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Convenience type alias for checkout results.
pub type Result<T> = std::result::Result<T, CheckoutError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors() {
        assert!(CheckoutError::EmptyOrder.is_client_error());
        assert!(CheckoutError::ProductNotFound(ProductId::new("x")).is_client_error());
        assert!(
            CheckoutError::InsufficientStock {
                product_id: ProductId::new("x"),
                available: 2,
                requested: 5,
            }
            .is_client_error()
        );
        assert!(
            !CheckoutError::Persistence {
                phase: Phase::HeaderWrite,
                detail: "down".to_string(),
            }
            .is_client_error()
        );
        assert!(
            !CheckoutError::Cancelled {
                phase: Phase::Commit
            }
            .is_client_error()
        );
    }

    #[test]
    fn test_display() {
        let err = CheckoutError::InsufficientStock {
            product_id: ProductId::new("SKU-001"),
            available: 2,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for product SKU-001: available 2, requested 5"
        );

        let err = CheckoutError::Persistence {
            phase: Phase::ItemWrite,
            detail: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "Persistence error during item_write: boom");
    }

    #[test]
    fn test_compensation_failed_keeps_original() {
        let order_id = OrderId::new();
        let err = CheckoutError::CompensationFailed {
            order_id,
            original: Box::new(CheckoutError::Persistence {
                phase: Phase::StockDecrement,
                detail: "boom".to_string(),
            }),
            detail: "delete failed".to_string(),
        };
        assert_eq!(err.kind(), "compensation_failed");
        assert!(err.to_string().contains("stock_decrement"));
    }
}
