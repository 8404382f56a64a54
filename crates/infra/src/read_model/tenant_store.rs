use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, PoisonError, RwLock};

use stockbook_core::TenantId;

/// Company-isolated key/value store.
///
/// A lookup never crosses companies: the same key under two companies is two
/// independent records.
pub trait TenantStore<K, V>: Send + Sync {
    fn get(&self, tenant_id: TenantId, key: &K) -> Option<V>;
    /// Insert or replace, returning the previous value.
    fn upsert(&self, tenant_id: TenantId, key: K, value: V) -> Option<V>;
    fn list(&self, tenant_id: TenantId) -> Vec<V>;
}

impl<K, V, S> TenantStore<K, V> for Arc<S>
where
    S: TenantStore<K, V> + ?Sized,
{
    fn get(&self, tenant_id: TenantId, key: &K) -> Option<V> {
        (**self).get(tenant_id, key)
    }

    fn upsert(&self, tenant_id: TenantId, key: K, value: V) -> Option<V> {
        (**self).upsert(tenant_id, key, value)
    }

    fn list(&self, tenant_id: TenantId) -> Vec<V> {
        (**self).list(tenant_id)
    }
}

/// In-memory company-isolated store for tests/dev.
#[derive(Debug)]
pub struct InMemoryTenantStore<K, V> {
    inner: RwLock<HashMap<TenantId, HashMap<K, V>>>,
}

impl<K, V> InMemoryTenantStore<K, V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> Default for InMemoryTenantStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> TenantStore<K, V> for InMemoryTenantStore<K, V>
where
    K: Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    fn get(&self, tenant_id: TenantId, key: &K) -> Option<V> {
        let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        map.get(&tenant_id)?.get(key).cloned()
    }

    fn upsert(&self, tenant_id: TenantId, key: K, value: V) -> Option<V> {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        map.entry(tenant_id).or_default().insert(key, value)
    }

    fn list(&self, tenant_id: TenantId) -> Vec<V> {
        let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        map.get(&tenant_id)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_are_isolated_per_tenant() {
        let store: InMemoryTenantStore<&'static str, u32> = InMemoryTenantStore::new();
        let (a, b) = (TenantId::new(), TenantId::new());

        assert_eq!(store.upsert(a, "x", 1), None);
        assert_eq!(store.upsert(a, "x", 2), Some(1));
        store.upsert(b, "x", 10);

        assert_eq!(store.get(a, &"x"), Some(2));
        assert_eq!(store.get(b, &"x"), Some(10));
        assert_eq!(store.get(TenantId::new(), &"x"), None);
        assert_eq!(store.list(a), vec![2]);
    }
}
