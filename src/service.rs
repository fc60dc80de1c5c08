use crate::chain_reader::{ChainReader, PageKey, PageRequest, TransferPage};
use crate::chains::recent_window_start;
use crate::config::SyncSettings;
use crate::error::{SyncError, SyncResult};
use crate::events::TransferRecord;
use crate::ledger::BalanceLedger;
use crate::lock::PoolLocks;
use crate::registry::PoolRegistry;
use crate::snapshot::{
    Snapshot, SnapshotMetadata, StopReason, SyncMode, TOP_HOLDER_LIMIT, rank_holders,
};
use crate::store::SnapshotStore;
use alloy_primitives::{Address, U256};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

/// Outcome of [`HolderSyncService::sync_all_pools`].
#[derive(Debug, Default)]
pub struct BatchReport {
    pub synced: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

struct TransferScan {
    transfers: Vec<TransferRecord>,
    pages: usize,
    /// Last block fully covered; `None` until a page has been accepted.
    scanned_to: Option<u64>,
    stop_reason: StopReason,
}

/// A page must continue exactly where the scan left off and hold only
/// transfers from `[window_start, page.scanned_to]`.
pub fn ensure_page_within_window(
    page: &TransferPage,
    window_start: u64,
    to_block: u64,
) -> SyncResult<()> {
    let inconsistent = |reason: String| SyncError::InconsistentPage {
        from_block: window_start,
        to_block,
        reason,
    };

    if page.scanned_to < window_start || page.scanned_to > to_block {
        return Err(inconsistent(format!(
            "reports blocks scanned through {}",
            page.scanned_to
        )));
    }
    if let Some(stray) = page
        .transfers
        .iter()
        .find(|t| t.block_number < window_start || t.block_number > page.scanned_to)
    {
        return Err(inconsistent(format!(
            "holds a transfer from block {} outside {window_start}-{}",
            stray.block_number, page.scanned_to
        )));
    }
    Ok(())
}

/// Rebuilds top-holder snapshots for pools from their token's transfer log.
pub struct HolderSyncService {
    chain: Arc<dyn ChainReader>,
    pools: Arc<dyn PoolRegistry>,
    store: Arc<dyn SnapshotStore>,
    settings: SyncSettings,
    locks: PoolLocks,
}

impl HolderSyncService {
    pub fn new(
        chain: Arc<dyn ChainReader>,
        pools: Arc<dyn PoolRegistry>,
        store: Arc<dyn SnapshotStore>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            chain,
            pools,
            store,
            settings,
            locks: PoolLocks::new(),
        }
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn locks(&self) -> &PoolLocks {
        &self.locks
    }

    /// Replays the pool token's transfers since the last snapshot (or its
    /// deployment, or a recent window) and persists the new top holders.
    pub async fn sync_top_holders(&self, pool_id: &str) -> SyncResult<Snapshot> {
        let started = Instant::now();

        let pool = self
            .pools
            .pool(pool_id)
            .await?
            .ok_or_else(|| SyncError::PoolNotFound(pool_id.to_string()))?;
        let token = pool
            .token_address
            .ok_or_else(|| SyncError::MissingTokenAddress(pool_id.to_string()))?;
        let chain_id = pool.chain_id;

        let _guard = self.locks.try_acquire(chain_id, pool_id)?;

        let latest_block = self.chain.latest_block(chain_id).await?;
        let prior = self.load_prior(chain_id, pool_id, token).await?;

        let (from_block, sync_mode) = match &prior {
            Some(prior) => {
                if latest_block <= prior.metadata.to_block {
                    info!(
                        pool_id,
                        chain_id,
                        to_block = prior.metadata.to_block,
                        latest_block,
                        "Holder snapshot already up to date"
                    );
                    return Ok(prior.clone());
                }
                (prior.metadata.to_block + 1, SyncMode::Incremental)
            }
            None => self.cold_start_block(chain_id, token, latest_block).await,
        };

        info!(
            pool_id,
            chain_id,
            token = ?token,
            from_block,
            to_block = latest_block,
            mode = %sync_mode,
            "Starting holder sync"
        );

        let scan = self
            .collect_transfers(chain_id, token, from_block, latest_block, started)
            .await?;

        // A cold start from genesis that scanned nothing has no block to record
        let Some(to_block) = scan.scanned_to.or_else(|| from_block.checked_sub(1)) else {
            warn!(
                pool_id,
                chain_id,
                stop_reason = %scan.stop_reason,
                "No blocks scanned, snapshot not saved"
            );
            return Err(SyncError::NothingScanned {
                pool_id: pool_id.to_string(),
                stop_reason: scan.stop_reason,
            });
        };

        let mut ledger = BalanceLedger::new(token);
        if let Some(prior) = &prior {
            ledger.seed(&prior.holders)?;
        }
        ledger.apply_all(&scan.transfers)?;
        let transfers_processed = ledger.transfers_applied();

        let total_supply = self.lookup_supply(chain_id, token).await;
        let holders = rank_holders(ledger.into_ranked(), total_supply, TOP_HOLDER_LIMIT);

        let snapshot = Snapshot {
            updated_at: Utc::now(),
            token_address: token,
            total_supply,
            holders,
            metadata: SnapshotMetadata {
                chain_id,
                pool_id: pool_id.to_string(),
                transfers_processed,
                from_block,
                to_block,
                processing_time_ms: started.elapsed().as_millis() as u64,
                sync_mode,
                stop_reason: scan.stop_reason,
            },
        };

        self.store.save(chain_id, pool_id, &snapshot).await?;

        if snapshot.is_complete() {
            info!(
                pool_id,
                chain_id,
                holders = snapshot.holders.len(),
                transfers = transfers_processed,
                pages = scan.pages,
                elapsed_ms = snapshot.metadata.processing_time_ms,
                "Holder snapshot saved"
            );
        } else {
            warn!(
                pool_id,
                chain_id,
                holders = snapshot.holders.len(),
                transfers = transfers_processed,
                pages = scan.pages,
                scanned_to = to_block,
                latest_block,
                stop_reason = %scan.stop_reason,
                "Holder snapshot saved from partial transfer history"
            );
        }

        Ok(snapshot)
    }

    /// Syncs every registered pool in turn. Per-pool failures are logged and
    /// reported; only failing to list the pools aborts the batch.
    pub async fn sync_all_pools(&self) -> SyncResult<BatchReport> {
        let pools = self.pools.pools().await?;
        info!(pools = pools.len(), "Syncing top holders for all pools");

        let mut report = BatchReport::default();
        for (index, pool) in pools.iter().enumerate() {
            if index > 0 {
                sleep(self.settings.pool_delay).await;
            }

            match self.sync_top_holders(&pool.pool_id).await {
                Ok(_) => report.synced.push(pool.pool_id.clone()),
                Err(e) => {
                    error!(
                        pool_id = %pool.pool_id,
                        chain_id = pool.chain_id,
                        error = %e,
                        "Holder sync failed, continuing with next pool"
                    );
                    report.failed.push((pool.pool_id.clone(), e.to_string()));
                }
            }
        }

        info!(
            synced = report.synced.len(),
            failed = report.failed.len(),
            "Batch holder sync finished"
        );
        Ok(report)
    }

    async fn load_prior(
        &self,
        chain_id: u64,
        pool_id: &str,
        token: Address,
    ) -> SyncResult<Option<Snapshot>> {
        let prior = self.store.load(chain_id, pool_id).await?;
        Ok(prior.filter(|snapshot| {
            let same_token = snapshot.token_address == token;
            if !same_token {
                warn!(
                    pool_id,
                    previous = ?snapshot.token_address,
                    current = ?token,
                    "Pool token changed since last snapshot, rebuilding from scratch"
                );
            }
            same_token
        }))
    }

    async fn cold_start_block(
        &self,
        chain_id: u64,
        token: Address,
        latest_block: u64,
    ) -> (u64, SyncMode) {
        match self.chain.creation_block(chain_id, token).await {
            Ok(Some(block)) => return (block, SyncMode::CreationBlock),
            Ok(None) => debug!(chain_id, token = ?token, "Creation block unknown"),
            Err(e) => warn!(
                chain_id,
                token = ?token,
                error = %e,
                "Creation block lookup failed, falling back to recent window"
            ),
        }
        (
            recent_window_start(chain_id, latest_block),
            SyncMode::RecentWindow,
        )
    }

    async fn lookup_supply(&self, chain_id: u64, token: Address) -> Option<U256> {
        match self.chain.total_supply(chain_id, token).await {
            Ok(supply) => supply,
            Err(e) => {
                warn!(
                    chain_id,
                    token = ?token,
                    error = %e,
                    "Total supply unavailable, holder percentages will be 0"
                );
                None
            }
        }
    }

    /// Time left before the sync deadline; `Some(ZERO)` once it has passed.
    fn remaining(&self, started: Instant) -> Option<Duration> {
        self.settings
            .deadline
            .map(|deadline| deadline.saturating_sub(started.elapsed()))
    }

    async fn collect_transfers(
        &self,
        chain_id: u64,
        token: Address,
        from_block: u64,
        to_block: u64,
        started: Instant,
    ) -> SyncResult<TransferScan> {
        let mut scan = TransferScan {
            transfers: Vec::new(),
            pages: 0,
            scanned_to: None,
            stop_reason: StopReason::Exhausted,
        };
        if from_block > to_block {
            return Ok(scan);
        }

        let mut page_key: Option<PageKey> = None;
        loop {
            let request = PageRequest {
                token,
                from_block,
                to_block,
                page_size: self.settings.page_size,
                page_key: page_key.take(),
            };

            let fetch = self.chain.transfer_page(chain_id, &request);
            let result = match self.remaining(started) {
                Some(left) if left.is_zero() => {
                    scan.stop_reason = StopReason::Deadline;
                    break;
                }
                Some(left) => match timeout(left, fetch).await {
                    Ok(result) => result,
                    Err(_) => {
                        scan.stop_reason = StopReason::Deadline;
                        break;
                    }
                },
                None => fetch.await,
            };

            let page = match result {
                Ok(page) => page,
                Err(e) => {
                    scan.stop_reason = if matches!(e, SyncError::UndecodableLogs { .. }) {
                        StopReason::UndecodableLogs
                    } else {
                        StopReason::UpstreamError
                    };
                    warn!(
                        chain_id,
                        token = ?token,
                        pages = scan.pages,
                        stop_reason = %scan.stop_reason,
                        error = %e,
                        "Transfer page rejected, continuing with partial data"
                    );
                    break;
                }
            };

            let window_start = scan.scanned_to.map_or(from_block, |scanned| scanned + 1);
            ensure_page_within_window(&page, window_start, to_block)?;

            scan.pages += 1;
            scan.scanned_to = Some(page.scanned_to);
            scan.transfers.extend(page.transfers);
            debug!(
                chain_id,
                page = scan.pages,
                scanned_to = page.scanned_to,
                transfers = scan.transfers.len(),
                "Collected transfer page"
            );

            let Some(next) = page.next_page_key else {
                break;
            };
            if scan.pages >= self.settings.max_pages {
                warn!(
                    chain_id,
                    token = ?token,
                    max_pages = self.settings.max_pages,
                    scanned_to = page.scanned_to,
                    "Transfer page cap reached"
                );
                scan.stop_reason = StopReason::PageCap;
                break;
            }
            page_key = Some(next);

            sleep(self.settings.page_delay).await;
        }

        if scan.stop_reason == StopReason::Deadline {
            warn!(
                chain_id,
                token = ?token,
                pages = scan.pages,
                scanned_to = ?scan.scanned_to,
                "Sync deadline reached, stopping pagination"
            );
        }
        Ok(scan)
    }
}
