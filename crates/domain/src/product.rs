//! The slice of a catalog product the order core reads.

use common::{Money, ProductId};
use serde::{Deserialize, Serialize};

/// A catalog product with its live price and stock counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub stock: u32,
}

impl Product {
    pub fn new(id: impl Into<ProductId>, name: impl Into<String>, price: Money, stock: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            stock,
        }
    }

    /// Returns true if `quantity` units can be taken from current stock.
    pub fn can_fulfill(&self, quantity: u32) -> bool {
        self.stock >= quantity
    }

    pub fn summary(&self) -> ProductSummary {
        ProductSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            price: self.price,
        }
    }
}

/// Product fields embedded next to an order line when reading orders back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub id: ProductId,
    pub name: String,
    /// Current catalog price, which may differ from the line's snapshot.
    pub price: Money,
}
