use super::{Database, PoolRepository, SnapshotRepository};
use crate::error::{SyncError, SyncResult};
use crate::registry::{PoolInfo, PoolRegistry};
use crate::snapshot::Snapshot;
use crate::store::SnapshotStore;
use async_trait::async_trait;

/// SQLite-backed pool registry and snapshot store.
#[derive(Clone)]
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub async fn upsert_pool(&self, pool: PoolInfo) -> SyncResult<()> {
        self.db
            .run(move |conn| PoolRepository::new(conn).upsert(&pool))
            .await
            .map_err(SyncError::store)
    }
}

#[async_trait]
impl SnapshotStore for SqliteStore {
    async fn load(&self, chain_id: u64, pool_id: &str) -> SyncResult<Option<Snapshot>> {
        let pool_id = pool_id.to_string();
        self.db
            .run(move |conn| SnapshotRepository::new(conn).load(chain_id, &pool_id))
            .await
            .map_err(SyncError::store)
    }

    async fn save(&self, chain_id: u64, pool_id: &str, snapshot: &Snapshot) -> SyncResult<()> {
        let pool_id = pool_id.to_string();
        let snapshot = snapshot.clone();
        self.db
            .run(move |conn| SnapshotRepository::new(conn).save(chain_id, &pool_id, &snapshot))
            .await
            .map_err(SyncError::store)
    }
}

#[async_trait]
impl PoolRegistry for SqliteStore {
    async fn pool(&self, pool_id: &str) -> SyncResult<Option<PoolInfo>> {
        let pool_id = pool_id.to_string();
        self.db
            .run(move |conn| PoolRepository::new(conn).get(&pool_id))
            .await
            .map_err(SyncError::store)
    }

    async fn pools(&self) -> SyncResult<Vec<PoolInfo>> {
        self.db
            .run(|conn| PoolRepository::new(conn).list())
            .await
            .map_err(SyncError::store)
    }
}
