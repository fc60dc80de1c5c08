pub mod chain_reader;
pub mod chains;
pub mod config;
pub mod deployment;
pub mod error;
pub mod events;
pub mod ledger;
pub mod lock;
pub mod query;
pub mod registry;
pub mod repository;
pub mod rpc;
pub mod service;
pub mod snapshot;
pub mod store;

pub use chain_reader::{ChainReader, PageKey, PageRequest, RpcChainReader, TransferPage};
pub use config::{Config, SyncSettings};
pub use error::{SyncError, SyncResult};
pub use registry::{InMemoryPoolRegistry, PoolInfo, PoolRegistry};
pub use service::{BatchReport, HolderSyncService};
pub use snapshot::{Holder, Snapshot, SnapshotMetadata, StopReason, SupplyShare, SyncMode};
pub use store::{FileSnapshotStore, InMemorySnapshotStore, SnapshotStore};

use repository::{Database, SqliteStore};
use std::sync::Arc;

/// Picks the snapshot backend: JSON files when `SNAPSHOT_DIR` is set,
/// otherwise the SQLite database that also holds the pool registry.
pub fn snapshot_store(config: &Config, db: &Database) -> Arc<dyn SnapshotStore> {
    match &config.snapshot_dir {
        Some(dir) => Arc::new(FileSnapshotStore::new(dir.clone())),
        None => Arc::new(SqliteStore::new(db.clone())),
    }
}
