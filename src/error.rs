use crate::snapshot::StopReason;
use alloy_primitives::Address;
use std::fmt::Display;
use thiserror::Error;

pub type SyncResult<T> = std::result::Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("pool {0} not found")]
    PoolNotFound(String),

    #[error("pool {0} has no token contract address")]
    MissingTokenAddress(String),

    #[error("a holder sync for pool {pool_id} on chain {chain_id} is already running")]
    SyncInProgress { chain_id: u64, pool_id: String },

    #[error("transfer page for blocks {from_block}-{to_block} {reason}")]
    InconsistentPage {
        from_block: u64,
        to_block: u64,
        reason: String,
    },

    #[error("sync of pool {pool_id} stopped ({stop_reason}) before scanning any block")]
    NothingScanned {
        pool_id: String,
        stop_reason: StopReason,
    },

    #[error("{failed} of {total} transfer logs in blocks {from_block}-{to_block} could not be decoded")]
    UndecodableLogs {
        from_block: u64,
        to_block: u64,
        failed: usize,
        total: usize,
    },

    #[error("balance arithmetic overflowed for {0:?}")]
    BalanceOverflow(Address),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("snapshot store error: {0}")]
    Store(String),
}

impl SyncError {
    pub fn upstream(err: impl Display) -> Self {
        SyncError::Upstream(err.to_string())
    }

    pub fn store(err: impl Display) -> Self {
        SyncError::Store(err.to_string())
    }

    /// Pool resolution failures: the pool is unknown or has no contract.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SyncError::PoolNotFound(_) | SyncError::MissingTokenAddress(_)
        )
    }
}
