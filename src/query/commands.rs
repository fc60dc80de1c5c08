use crate::query::formatters::{OutputFormat, format_pools, format_snapshot};
use crate::registry::{PoolInfo, PoolRegistry};
use crate::repository::SqliteStore;
use crate::store::SnapshotStore;
use alloy_primitives::Address;
use anyhow::Result;
use std::str::FromStr;

pub async fn cmd_snapshot(
    pools: &dyn PoolRegistry,
    store: &dyn SnapshotStore,
    pool_id: &str,
    format: &OutputFormat,
) -> Result<()> {
    let pool = pools
        .pool(pool_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Pool not found: {}", pool_id))?;

    match store.load(pool.chain_id, pool_id).await? {
        Some(snapshot) => println!("{}", format_snapshot(&snapshot, pool.decimals, format)),
        None => println!("No snapshot stored for pool {pool_id} yet."),
    }

    Ok(())
}

pub async fn cmd_pools(pools: &dyn PoolRegistry, format: &OutputFormat) -> Result<()> {
    let pools = pools.pools().await?;
    println!("{}", format_pools(&pools, format));
    Ok(())
}

pub struct NewPool {
    pub pool_id: String,
    pub chain_id: u64,
    pub token: String,
    pub symbol: Option<String>,
    pub decimals: Option<u8>,
}

pub async fn cmd_add_pool(store: &SqliteStore, pool: NewPool) -> Result<PoolInfo> {
    if pool.pool_id.trim().is_empty() {
        return Err(anyhow::anyhow!("Pool id must not be empty"));
    }
    let token = Address::from_str(&pool.token)
        .map_err(|_| anyhow::anyhow!("Invalid token address format: {}", pool.token))?;

    let info = PoolInfo {
        pool_id: pool.pool_id,
        chain_id: pool.chain_id,
        token_address: Some(token),
        symbol: pool.symbol,
        decimals: pool.decimals,
    };
    store.upsert_pool(info.clone()).await?;
    println!("Registered pool {} on chain {}", info.pool_id, info.chain_id);

    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::Database;

    fn new_pool(token: &str) -> NewPool {
        NewPool {
            pool_id: "pool-1".to_string(),
            chain_id: 8_453,
            token: token.to_string(),
            symbol: Some("WETH".to_string()),
            decimals: Some(18),
        }
    }

    #[tokio::test]
    async fn test_add_pool_registers_it() {
        let store = SqliteStore::new(Database::in_memory().unwrap());
        let added = cmd_add_pool(
            &store,
            new_pool("0x4200000000000000000000000000000000000006"),
        )
        .await
        .unwrap();

        let stored = store.pool("pool-1").await.unwrap().unwrap();
        assert_eq!(stored, added);
        assert_eq!(stored.chain_id, 8_453);
    }

    #[tokio::test]
    async fn test_add_pool_rejects_bad_address() {
        let store = SqliteStore::new(Database::in_memory().unwrap());
        assert!(cmd_add_pool(&store, new_pool("not-an-address")).await.is_err());
        assert!(store.pools().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_for_unknown_pool_fails() {
        let store = SqliteStore::new(Database::in_memory().unwrap());
        let err = cmd_snapshot(&store, &store, "missing", &OutputFormat::Table)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("missing"));
    }
}
