//! Product catalog lookups needed to record movements.
//!
//! The ledger only needs a product's measurement units; everything else about
//! products lives outside this crate.

use std::sync::Arc;

use stockbook_core::{ProductId, TenantId};
use stockbook_inventory::ProductUnits;

use crate::read_model::{InMemoryTenantStore, TenantStore};

/// Source of product measurement definitions, per company.
pub trait ProductCatalog: Send + Sync {
    fn units(&self, company_id: TenantId, product_id: ProductId) -> Option<ProductUnits>;

    /// Register or replace a product's units. Returns the previous definition.
    fn register(&self, company_id: TenantId, units: ProductUnits) -> Option<ProductUnits>;

    fn list(&self, company_id: TenantId) -> Vec<ProductUnits>;
}

impl<C> ProductCatalog for Arc<C>
where
    C: ProductCatalog + ?Sized,
{
    fn units(&self, company_id: TenantId, product_id: ProductId) -> Option<ProductUnits> {
        (**self).units(company_id, product_id)
    }

    fn register(&self, company_id: TenantId, units: ProductUnits) -> Option<ProductUnits> {
        (**self).register(company_id, units)
    }

    fn list(&self, company_id: TenantId) -> Vec<ProductUnits> {
        (**self).list(company_id)
    }
}

/// Catalog backed by any [`TenantStore`].
#[derive(Debug, Default)]
pub struct TenantStoreCatalog<S> {
    store: S,
}

impl<S> TenantStoreCatalog<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S> ProductCatalog for TenantStoreCatalog<S>
where
    S: TenantStore<ProductId, ProductUnits>,
{
    fn units(&self, company_id: TenantId, product_id: ProductId) -> Option<ProductUnits> {
        self.store.get(company_id, &product_id)
    }

    fn register(&self, company_id: TenantId, units: ProductUnits) -> Option<ProductUnits> {
        self.store.upsert(company_id, units.product_id, units)
    }

    fn list(&self, company_id: TenantId) -> Vec<ProductUnits> {
        let mut all = self.store.list(company_id);
        all.sort_by_key(|u| u.product_id);
        all
    }
}

pub type InMemoryProductCatalog = TenantStoreCatalog<InMemoryTenantStore<ProductId, ProductUnits>>;

impl InMemoryProductCatalog {
    pub fn in_memory() -> Self {
        Self::new(InMemoryTenantStore::new())
    }
}
