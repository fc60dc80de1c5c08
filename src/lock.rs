use crate::error::{SyncError, SyncResult};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

type PoolKey = (u64, String);

/// Advisory single-flight guard: at most one sync per (chain, pool) at a time.
#[derive(Clone, Default)]
pub struct PoolLocks {
    held: Arc<Mutex<HashSet<PoolKey>>>,
}

impl PoolLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self, chain_id: u64, pool_id: &str) -> SyncResult<PoolLockGuard> {
        let key = (chain_id, pool_id.to_string());
        let mut held = self
            .held
            .lock()
            .map_err(|_| SyncError::Store("pool lock table poisoned".to_string()))?;

        if !held.insert(key.clone()) {
            return Err(SyncError::SyncInProgress {
                chain_id,
                pool_id: pool_id.to_string(),
            });
        }

        Ok(PoolLockGuard {
            held: Arc::clone(&self.held),
            key,
        })
    }

    pub fn is_held(&self, chain_id: u64, pool_id: &str) -> bool {
        self.held
            .lock()
            .map(|held| held.contains(&(chain_id, pool_id.to_string())))
            .unwrap_or(false)
    }
}

/// Releases its (chain, pool) slot when dropped.
pub struct PoolLockGuard {
    held: Arc<Mutex<HashSet<PoolKey>>>,
    key: PoolKey,
}

impl Drop for PoolLockGuard {
    fn drop(&mut self) {
        if let Ok(mut held) = self.held.lock() {
            held.remove(&self.key);
        }
    }
}
