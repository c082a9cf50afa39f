//! Per-identifier exclusion for callers reconciling in parallel.
//!
//! The reconciler does not serialize work on the same object. Two updates
//! racing on one id would both send the same revision and one of them would
//! be lost, so callers hold an [`IdLocks`] guard for the id while they
//! refresh and apply.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Keyed async mutexes. Different keys never block each other.
#[derive(Default, Clone)]
pub struct IdLocks {
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl IdLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let slot = {
            let mut locks = self.locks.lock().await;
            // Drop slots nobody holds or waits on.
            locks.retain(|k, slot| k == key || Arc::strong_count(slot) > 1);
            Arc::clone(locks.entry(key.to_string()).or_default())
        };
        slot.lock_owned().await
    }

    /// Number of keys currently tracked.
    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let locks = IdLocks::new();
        let guard = locks.lock("p1").await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.lock("p1").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .expect("contender should acquire the lock")
            .unwrap();
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let locks = IdLocks::new();
        let _a = locks.lock("p1").await;
        let b = tokio::time::timeout(Duration::from_secs(1), locks.lock("p2")).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_released_slots_are_pruned() {
        let locks = IdLocks::new();
        drop(locks.lock("p1").await);
        drop(locks.lock("p2").await);
        let _c = locks.lock("p3").await;
        assert_eq!(locks.len().await, 1);
    }
}
