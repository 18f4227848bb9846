//! Order checkout for the order/inventory core.
//!
//! This crate provides:
//! - [`OrderCoordinator`]: turns a cart into an order while keeping stock
//!   counts consistent, with compensation when the commit pass fails
//! - [`PaymentProcessor`]: charges an order through a [`PaymentGateway`]
//!   and records the outcome on the order

pub mod coordinator;
pub mod error;
pub mod payment;

pub use coordinator::OrderCoordinator;
pub use error::{CheckoutError, PaymentError, Phase, Result};
pub use payment::{
    ChargeOutcome, InMemoryPaymentGateway, PaymentGateway, PaymentProcessor, PaymentReceipt,
};
pub use tokio_util::sync::CancellationToken;
