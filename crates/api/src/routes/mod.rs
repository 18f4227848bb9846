pub mod analytics;
pub mod auth;
pub mod ops;
pub mod orders;
pub mod payments;
