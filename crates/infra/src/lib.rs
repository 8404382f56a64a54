//! Infrastructure layer: ledger storage, product catalog, key locking and the
//! services that orchestrate them.

pub mod catalog;
pub mod error;
pub mod ledger_service;
pub mod ledger_store;
pub mod locks;
pub mod read_model;
pub mod recalculation;


pub use catalog::{InMemoryProductCatalog, ProductCatalog, TenantStoreCatalog};
pub use error::LedgerError;
pub use ledger_service::{LedgerService, LedgerSettings, RecordedTransaction};
pub use ledger_store::{
    InMemoryLedgerStore, KeyFilter, KeyPage, LedgerStore, LedgerStoreError, Pagination,
    TransactionFilter, TransactionPage,
};
pub use locks::KeyLocks;
pub use recalculation::{KeyRecalculation, RecalculationEngine, RecalculationSummary};
