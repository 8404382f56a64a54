//! Company-isolated lookup tables backing the reference data the ledger reads.

pub mod tenant_store;

pub use tenant_store::{InMemoryTenantStore, TenantStore};
