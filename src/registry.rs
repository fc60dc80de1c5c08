use crate::error::SyncResult;
use alloy_primitives::Address;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// A tracked pool and the token whose holders are reconstructed for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolInfo {
    pub pool_id: String,
    pub chain_id: u64,
    pub token_address: Option<Address>,
    pub symbol: Option<String>,
    pub decimals: Option<u8>,
}

impl PoolInfo {
    pub fn new(pool_id: impl Into<String>, chain_id: u64, token_address: Address) -> Self {
        Self {
            pool_id: pool_id.into(),
            chain_id,
            token_address: Some(token_address),
            symbol: None,
            decimals: None,
        }
    }
}

#[async_trait]
pub trait PoolRegistry: Send + Sync {
    async fn pool(&self, pool_id: &str) -> SyncResult<Option<PoolInfo>>;

    async fn pools(&self) -> SyncResult<Vec<PoolInfo>>;
}

/// Registry held in memory, ordered by pool id.
#[derive(Default)]
pub struct InMemoryPoolRegistry {
    pools: RwLock<BTreeMap<String, PoolInfo>>,
}

impl InMemoryPoolRegistry {
    pub fn new(pools: impl IntoIterator<Item = PoolInfo>) -> Self {
        Self {
            pools: RwLock::new(
                pools
                    .into_iter()
                    .map(|pool| (pool.pool_id.clone(), pool))
                    .collect(),
            ),
        }
    }

    pub async fn insert(&self, pool: PoolInfo) {
        self.pools.write().await.insert(pool.pool_id.clone(), pool);
    }
}

#[async_trait]
impl PoolRegistry for InMemoryPoolRegistry {
    async fn pool(&self, pool_id: &str) -> SyncResult<Option<PoolInfo>> {
        Ok(self.pools.read().await.get(pool_id).cloned())
    }

    async fn pools(&self) -> SyncResult<Vec<PoolInfo>> {
        Ok(self.pools.read().await.values().cloned().collect())
    }
}
