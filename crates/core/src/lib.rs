//! `stockroom-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no IO, no storage).

pub mod aggregate;
pub mod entity;
pub mod error;
pub mod id;

pub use aggregate::Aggregate;
pub use entity::Entity;
pub use error::{DomainError, DomainResult, ensure_positive};
pub use id::{Location, ProductId};
