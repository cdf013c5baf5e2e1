//! Per-tenant activation locks.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;

/// Serializes activations of the same tenant. Distinct tenants never block
/// each other.
#[derive(Debug, Default)]
pub struct TenantLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl TenantLocks {
    /// Create an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the tenant's lock, blocking until it is free.
    pub fn with_lock<R>(&self, tenant: &str, f: impl FnOnce() -> R) -> R {
        let mutex = self.mutex_for(tenant);
        let _guard = mutex.lock();
        f()
    }

    /// Run `f` only if nobody holds the tenant's lock.
    pub fn try_with_lock<R>(&self, tenant: &str, f: impl FnOnce() -> R) -> Option<R> {
        let mutex = self.mutex_for(tenant);
        let _guard = mutex.try_lock()?;
        Some(f())
    }

    /// Number of tenants seen so far.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Whether no tenant has been locked yet.
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    fn mutex_for(&self, tenant: &str) -> Arc<Mutex<()>> {
        // Clone out of the map so the shard lock is not held while waiting.
        Arc::clone(
            self.locks
                .entry(tenant.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        )
    }
}
