//! Shared types for the order/inventory core.

pub mod money;
pub mod types;

pub use money::Money;
pub use types::{OrderId, OrderItemId, ProductId, UserId};
