//! Append-only ledger store boundary.
//!
//! Defines the storage-facing abstraction the recalculation engine and the
//! ledger service work against, without making any storage assumptions.

pub mod in_memory;
pub mod query;
pub mod r#trait;

pub use in_memory::InMemoryLedgerStore;
pub use query::{KeyFilter, KeyPage, Pagination, TransactionFilter, TransactionPage};
pub use r#trait::{LedgerStore, LedgerStoreError};
