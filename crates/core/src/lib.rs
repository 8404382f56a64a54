//! `stockbook-core` — shared domain building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! strongly-typed identifiers, the domain error model and the revision token
//! used for optimistic concurrency on ledger records.

pub mod entity;
pub mod error;
pub mod id;
pub mod version;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{ProductId, StoreId, TenantId, TransactionId, TransferId, UserId};
pub use version::ExpectedVersion;
