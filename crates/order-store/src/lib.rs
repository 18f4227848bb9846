//! Storage layer for the order/inventory core.
//!
//! - [`InventoryStore`] owns product stock and exposes the atomic conditional
//!   decrement.
//! - [`OrderLedger`] owns order headers and their lines.
//! - [`OrderStore`] combines both and opens [`CommitUnit`]s that group line
//!   writes and stock decrements into one all-or-nothing step.
//!
//! Two backends are provided: [`InMemoryOrderStore`] and [`PostgresOrderStore`].

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryOrderStore;
pub use postgres::PostgresOrderStore;
pub use store::{CommitUnit, InventoryStore, OrderLedger, OrderLedgerExt, OrderStore};
