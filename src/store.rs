use crate::error::{SyncError, SyncResult};
use crate::snapshot::Snapshot;
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;

/// Persistence for the latest snapshot of each (chain, pool).
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn load(&self, chain_id: u64, pool_id: &str) -> SyncResult<Option<Snapshot>>;

    async fn save(&self, chain_id: u64, pool_id: &str, snapshot: &Snapshot) -> SyncResult<()>;
}

#[derive(Default)]
pub struct InMemorySnapshotStore {
    snapshots: RwLock<HashMap<(u64, String), Snapshot>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.snapshots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.snapshots.read().await.is_empty()
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn load(&self, chain_id: u64, pool_id: &str) -> SyncResult<Option<Snapshot>> {
        Ok(self
            .snapshots
            .read()
            .await
            .get(&(chain_id, pool_id.to_string()))
            .cloned())
    }

    async fn save(&self, chain_id: u64, pool_id: &str, snapshot: &Snapshot) -> SyncResult<()> {
        self.snapshots
            .write()
            .await
            .insert((chain_id, pool_id.to_string()), snapshot.clone());
        Ok(())
    }
}

fn ensure_snapshot_key(
    snapshot: &Snapshot,
    chain_id: u64,
    pool_id: &str,
    path: &Path,
) -> SyncResult<()> {
    let meta = &snapshot.metadata;
    if meta.chain_id != chain_id || meta.pool_id != pool_id {
        return Err(SyncError::Store(format!(
            "{} holds the snapshot of pool {} on chain {}, expected pool {pool_id} on chain {chain_id}",
            path.display(),
            meta.pool_id,
            meta.chain_id
        )));
    }
    Ok(())
}

/// One JSON document per (chain, pool) under a directory.
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn snapshot_path(&self, chain_id: u64, pool_id: &str) -> PathBuf {
        self.dir
            .join(format!("{chain_id}-{}.json", encode_pool_id(pool_id)))
    }
}

/// Escapes every byte outside `[A-Za-z0-9.-]` as `_xx` so distinct pool ids
/// never share a file name.
fn encode_pool_id(pool_id: &str) -> String {
    let mut encoded = String::with_capacity(pool_id.len());
    for byte in pool_id.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.') {
            encoded.push(char::from(byte));
        } else {
            encoded.push_str(&format!("_{byte:02x}"));
        }
    }
    encoded
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn load(&self, chain_id: u64, pool_id: &str) -> SyncResult<Option<Snapshot>> {
        let path = self.snapshot_path(chain_id, pool_id);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SyncError::Store(format!(
                    "failed to read {}: {e}",
                    path.display()
                )));
            }
        };

        let snapshot = serde_json::from_slice(&raw).map_err(|e| {
            SyncError::Store(format!("corrupt snapshot {}: {e}", path.display()))
        })?;
        ensure_snapshot_key(&snapshot, chain_id, pool_id, &path)?;
        Ok(Some(snapshot))
    }

    async fn save(&self, chain_id: u64, pool_id: &str, snapshot: &Snapshot) -> SyncResult<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(SyncError::store)?;

        let path = self.snapshot_path(chain_id, pool_id);
        let tmp_path = path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(snapshot).map_err(SyncError::store)?;

        tokio::fs::write(&tmp_path, body)
            .await
            .map_err(SyncError::store)?;
        tokio::fs::rename(&tmp_path, &path)
            .await
            .map_err(SyncError::store)?;

        debug!(path = %path.display(), "Wrote holder snapshot");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{SnapshotMetadata, StopReason, SyncMode, rank_holders};
    use alloy_primitives::{U256, address};
    use chrono::Utc;

    fn sample() -> Snapshot {
        let holder = address!("0x000000000000000000000000000000000000000a");
        Snapshot {
            updated_at: Utc::now(),
            token_address: address!("0x00000000000000000000000000000000000000ff"),
            total_supply: Some(U256::from(1_000)),
            holders: rank_holders(
                vec![(holder, U256::from(250))],
                Some(U256::from(1_000)),
                20,
            ),
            metadata: SnapshotMetadata {
                chain_id: 1,
                pool_id: "curve/3pool".to_string(),
                transfers_processed: 1,
                from_block: 1,
                to_block: 2,
                processing_time_ms: 3,
                sync_mode: SyncMode::CreationBlock,
                stop_reason: StopReason::Exhausted,
            },
        }
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("snapshots"));

        assert!(store.load(1, "curve/3pool").await.unwrap().is_none());

        let snapshot = sample();
        store.save(1, "curve/3pool", &snapshot).await.unwrap();

        let path = store.snapshot_path(1, "curve/3pool");
        assert_eq!(path.file_name().unwrap(), "1-curve_2f3pool.json");
        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());

        let loaded = store.load(1, "curve/3pool").await.unwrap();
        assert_eq!(loaded, Some(snapshot));
    }

    #[test]
    fn test_pool_ids_map_to_distinct_files() {
        let store = FileSnapshotStore::new("/var/lib/holders");
        let ids = ["curve/3pool", "curve_3pool", "curve 3pool", "curve_2f3pool"];

        let mut names: Vec<PathBuf> = ids.iter().map(|id| store.snapshot_path(1, id)).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), ids.len());
        assert_eq!(
            store.snapshot_path(1, "aave-v3.usdc").file_name().unwrap(),
            "1-aave-v3.usdc.json"
        );
    }

    #[tokio::test]
    async fn test_similar_pool_ids_keep_separate_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path());

        let first = sample();
        store.save(1, "curve/3pool", &first).await.unwrap();
        assert!(store.load(1, "curve_3pool").await.unwrap().is_none());

        let mut other = first.clone();
        other.metadata.pool_id = "curve_3pool".to_string();
        other.holders.clear();
        store.save(1, "curve_3pool", &other).await.unwrap();

        assert_eq!(store.load(1, "curve/3pool").await.unwrap(), Some(first));
        assert_eq!(store.load(1, "curve_3pool").await.unwrap(), Some(other));
    }

    #[tokio::test]
    async fn test_file_store_rejects_snapshot_of_another_pool() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path());

        let foreign = sample();
        let body = serde_json::to_vec(&foreign).unwrap();
        std::fs::write(store.snapshot_path(10, "curve/3pool"), body).unwrap();

        let err = store.load(10, "curve/3pool").await.unwrap_err();
        assert!(matches!(err, SyncError::Store(ref msg) if msg.contains("on chain 1, expected")));
    }

    #[tokio::test]
    async fn test_file_store_reports_corrupt_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path());
        std::fs::write(store.snapshot_path(1, "broken"), b"{not json").unwrap();

        let err = store.load(1, "broken").await.unwrap_err();
        assert!(matches!(err, SyncError::Store(_)));
    }

    #[tokio::test]
    async fn test_memory_store_is_partitioned_by_chain() {
        let store = InMemorySnapshotStore::new();
        store.save(1, "pool", &sample()).await.unwrap();

        assert!(store.load(1, "pool").await.unwrap().is_some());
        assert!(store.load(10, "pool").await.unwrap().is_none());
        assert_eq!(store.len().await, 1);
    }
}
