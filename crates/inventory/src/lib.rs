//! Inventory domain module.
//!
//! This crate contains business rules for stock held at a location,
//! implemented purely as deterministic domain logic (no IO, no storage).

pub mod stock;

pub use stock::{StockChange, StockCommand, StockRecord, StockSnapshot};
