//! Domain model for the order/inventory core.
//!
//! This crate provides:
//! - Product, order header and order line records
//! - Order and payment status enums
//! - The order lifecycle (system-driven and administrative status updates)

pub mod error;
pub mod lifecycle;
pub mod order;
pub mod product;

pub use common::{Money, OrderId, OrderItemId, ProductId, UserId};
pub use error::DomainError;
pub use lifecycle::{OrderLifecycle, StatusUpdate};
pub use order::{
    CreateOrderRequest, NewOrder, NewOrderItem, Order, OrderItem, OrderItemDetail,
    OrderLineRequest, OrderStatus, OrderWithItems, PaymentStatus, ShippingAddress,
};
pub use product::{Product, ProductSummary};
