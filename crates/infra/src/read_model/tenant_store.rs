use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock};

use ferrepos_core::TenantId;

/// Key/value store where every record belongs to exactly one tenant.
///
/// A lookup can never see another tenant's records: the tenant is part of
/// the key. Read models are rebuildable, so a poisoned lock degrades to
/// "no data" instead of an error.
pub trait TenantStore<K, V>: Send + Sync {
    fn get(&self, tenant_id: TenantId, key: &K) -> Option<V>;
    fn upsert(&self, tenant_id: TenantId, key: K, value: V);
    fn remove(&self, tenant_id: TenantId, key: &K) -> Option<V>;
    fn list(&self, tenant_id: TenantId) -> Vec<V>;
    /// Every record of every tenant (platform-wide views).
    fn list_all(&self) -> Vec<(TenantId, V)>;
    fn clear_tenant(&self, tenant_id: TenantId);
}

impl<K, V, S> TenantStore<K, V> for Arc<S>
where
    S: TenantStore<K, V> + ?Sized,
{
    fn get(&self, tenant_id: TenantId, key: &K) -> Option<V> {
        (**self).get(tenant_id, key)
    }

    fn upsert(&self, tenant_id: TenantId, key: K, value: V) {
        (**self).upsert(tenant_id, key, value)
    }

    fn remove(&self, tenant_id: TenantId, key: &K) -> Option<V> {
        (**self).remove(tenant_id, key)
    }

    fn list(&self, tenant_id: TenantId) -> Vec<V> {
        (**self).list(tenant_id)
    }

    fn list_all(&self) -> Vec<(TenantId, V)> {
        (**self).list_all()
    }

    fn clear_tenant(&self, tenant_id: TenantId) {
        (**self).clear_tenant(tenant_id)
    }
}

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
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, tenant_id: TenantId, key: &K) -> Option<V> {
        let map = self.inner.read().ok()?;
        map.get(&tenant_id)?.get(key).cloned()
    }

    fn upsert(&self, tenant_id: TenantId, key: K, value: V) {
        if let Ok(mut map) = self.inner.write() {
            map.entry(tenant_id).or_default().insert(key, value);
        }
    }

    fn remove(&self, tenant_id: TenantId, key: &K) -> Option<V> {
        let mut map = self.inner.write().ok()?;
        map.get_mut(&tenant_id)?.remove(key)
    }

    fn list(&self, tenant_id: TenantId) -> Vec<V> {
        let Ok(map) = self.inner.read() else {
            return vec![];
        };
        map.get(&tenant_id)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default()
    }

    fn list_all(&self) -> Vec<(TenantId, V)> {
        let Ok(map) = self.inner.read() else {
            return vec![];
        };
        map.iter()
            .flat_map(|(tenant_id, records)| records.values().map(|v| (*tenant_id, v.clone())))
            .collect()
    }

    fn clear_tenant(&self, tenant_id: TenantId) {
        if let Ok(mut map) = self.inner.write() {
            map.remove(&tenant_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenants_never_see_each_other() {
        let store: InMemoryTenantStore<&'static str, u32> = InMemoryTenantStore::new();
        let (a, b) = (TenantId::new(), TenantId::new());
        store.upsert(a, "k", 1);
        store.upsert(b, "k", 2);

        assert_eq!(store.get(a, &"k"), Some(1));
        assert_eq!(store.get(b, &"k"), Some(2));
        assert_eq!(store.list(a), vec![1]);
        assert_eq!(store.list_all().len(), 2);
    }

    #[test]
    fn remove_and_clear_are_scoped() {
        let store: InMemoryTenantStore<&'static str, u32> = InMemoryTenantStore::new();
        let (a, b) = (TenantId::new(), TenantId::new());
        store.upsert(a, "x", 1);
        store.upsert(a, "y", 2);
        store.upsert(b, "x", 3);

        assert_eq!(store.remove(b, &"y"), None);
        assert_eq!(store.remove(a, &"x"), Some(1));
        store.clear_tenant(a);
        assert!(store.list(a).is_empty());
        assert_eq!(store.list(b), vec![3]);
    }
}
