//! Process-wide cache lock.
//!
//! The group reconciler and the offboarding sweep contend on the same cache
//! keys. Single `get`/`set` calls on independent keys go unlocked; this lock
//! linearizes the multi-step read-modify-write sequences (offboarding
//! deletes, `user_list` rewrites) against each other.

use std::sync::Arc;

use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Cloneable handle to the single shared read-write lock.
///
/// Constructed once at startup and passed explicitly to every component that
/// mutates shared cache keys.
#[derive(Clone, Default)]
pub struct SharedCacheLock {
    inner: Arc<RwLock<()>>,
}

impl SharedCacheLock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for a read-only sequence.
    pub async fn read(&self) -> RwLockReadGuard<'_, ()> {
        self.inner.read().await
    }

    /// Acquire the lock for a read-modify-write sequence.
    pub async fn write(&self) -> RwLockWriteGuard<'_, ()> {
        self.inner.write().await
    }
}

impl std::fmt::Debug for SharedCacheLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedCacheLock").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_clones_share_one_lock() {
        let lock = SharedCacheLock::new();
        let other = lock.clone();

        let guard = lock.write().await;
        assert!(other.inner.try_write().is_err());
        drop(guard);
        assert!(other.inner.try_write().is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_readers() {
        let lock = SharedCacheLock::new();
        let _a = lock.read().await;
        let _b = lock.read().await;
    }
}
