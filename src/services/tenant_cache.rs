//! Tenant name to id resolution with a per-entry time-to-live.
//!
//! The cache is process-local. Lookups that hit the store while an entry is
//! being refreshed may race; both writers store the same answer, so the last
//! one wins without harm. Store failures resolve to an inactive tenant and are
//! never cached, so the next request retries.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use uuid::Uuid;

use crate::store::TenantStore;

pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantResolution {
    pub tenant_id: Option<Uuid>,
    pub is_active: bool,
}

impl TenantResolution {
    const INACTIVE: TenantResolution = TenantResolution {
        tenant_id: None,
        is_active: false,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub entries: usize,
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    resolution: TenantResolution,
    last_updated: Instant,
}

struct Inner {
    store: Arc<dyn TenantStore>,
    ttl: Duration,
    entries: RwLock<HashMap<String, Entry>>,
}

#[derive(Clone)]
pub struct TenantCache {
    inner: Arc<Inner>,
}

impl TenantCache {
    pub fn new(store: Arc<dyn TenantStore>, ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                ttl,
                entries: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub async fn resolve(&self, key: &str) -> TenantResolution {
        let cached = self.read().get(key).copied();
        if let Some(entry) = cached {
            if entry.last_updated.elapsed() < self.inner.ttl {
                return entry.resolution;
            }
        }

        match self.inner.store.find_tenant_by_name(key).await {
            Ok(found) => {
                let resolution = match found {
                    Some(tenant) => TenantResolution {
                        tenant_id: Some(tenant.id),
                        is_active: tenant.is_active,
                    },
                    None => TenantResolution::INACTIVE,
                };
                self.write().insert(
                    key.to_string(),
                    Entry {
                        resolution,
                        last_updated: Instant::now(),
                    },
                );
                resolution
            }
            Err(e) => {
                tracing::error!(tenant = %key, error = %e, "tenant lookup failed");
                TenantResolution::INACTIVE
            }
        }
    }

    pub fn invalidate(&self, key: &str) {
        self.write().remove(key);
    }

    pub fn clear_all(&self) {
        self.write().clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.read().len(),
            ttl_secs: self.inner.ttl.as_secs(),
        }
    }

    // A panic while holding the lock leaves the map itself consistent.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Entry>> {
        self.inner.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Entry>> {
        self.inner.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::models::tenant::Tenant;
    use crate::store::MockTenantStore;

    fn tenant(active: bool) -> Tenant {
        Tenant {
            id: Uuid::from_u128(7),
            name: "acme".to_string(),
            is_active: active,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_entries_are_served_without_store_reads() {
        let mut store = MockTenantStore::new();
        store
            .expect_find_tenant_by_name()
            .times(1)
            .returning(|_| Ok(Some(tenant(true))));
        let cache = TenantCache::new(Arc::new(store), Duration::from_secs(60));

        let first = cache.resolve("acme").await;
        tokio::time::advance(Duration::from_secs(59)).await;
        let second = cache.resolve("acme").await;

        assert_eq!(first, second);
        assert_eq!(first.tenant_id, Some(Uuid::from_u128(7)));
        assert!(first.is_active);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_entries_are_refreshed_from_the_store() {
        let mut store = MockTenantStore::new();
        let mut seq = mockall::Sequence::new();
        store
            .expect_find_tenant_by_name()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(Some(tenant(true))));
        store
            .expect_find_tenant_by_name()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(Some(tenant(false))));
        let cache = TenantCache::new(Arc::new(store), Duration::from_secs(60));

        assert!(cache.resolve("acme").await.is_active);
        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(!cache.resolve("acme").await.is_active);
    }

    #[tokio::test]
    async fn unknown_tenant_is_cached_as_inactive() {
        let mut store = MockTenantStore::new();
        store
            .expect_find_tenant_by_name()
            .times(1)
            .returning(|_| Ok(None));
        let cache = TenantCache::new(Arc::new(store), DEFAULT_TTL);

        assert_eq!(cache.resolve("ghost").await, TenantResolution::INACTIVE);
        assert_eq!(cache.resolve("ghost").await, TenantResolution::INACTIVE);
        assert_eq!(cache.stats().entries, 1);
    }

    #[tokio::test]
    async fn store_failure_resolves_inactive_and_is_not_cached() {
        let mut store = MockTenantStore::new();
        let mut seq = mockall::Sequence::new();
        store
            .expect_find_tenant_by_name()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(Error::Internal("connection reset".to_string())));
        store
            .expect_find_tenant_by_name()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(Some(tenant(true))));
        let cache = TenantCache::new(Arc::new(store), DEFAULT_TTL);

        assert_eq!(cache.resolve("acme").await, TenantResolution::INACTIVE);
        assert_eq!(cache.stats().entries, 0);
        assert!(cache.resolve("acme").await.is_active);
    }

    #[tokio::test]
    async fn invalidate_forces_a_reload() {
        let mut store = MockTenantStore::new();
        store
            .expect_find_tenant_by_name()
            .times(2)
            .returning(|_| Ok(Some(tenant(true))));
        let cache = TenantCache::new(Arc::new(store), DEFAULT_TTL);

        cache.resolve("acme").await;
        cache.invalidate("acme");
        assert_eq!(cache.stats().entries, 0);
        cache.resolve("acme").await;

        cache.clear_all();
        assert_eq!(cache.stats().entries, 0);
    }
}
