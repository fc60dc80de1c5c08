#![allow(dead_code)]

use alloy_primitives::{Address, U256, address};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use top_holders::chain_reader::{ChainReader, PageKey, PageRequest, TransferPage};
use top_holders::events::TransferRecord;
use top_holders::{
    HolderSyncService, InMemoryPoolRegistry, InMemorySnapshotStore, PoolInfo, SyncError,
    SyncResult, SyncSettings,
};

pub const TOKEN: Address = address!("0x00000000000000000000000000000000000000ff");
pub const ALICE: Address = address!("0x000000000000000000000000000000000000000a");
pub const BOB: Address = address!("0x000000000000000000000000000000000000000b");
pub const CAROL: Address = address!("0x000000000000000000000000000000000000000c");
pub const DAVE: Address = address!("0x000000000000000000000000000000000000000d");

pub const CHAIN_ID: u64 = 1;
pub const POOL_ID: &str = "pool-1";

pub fn mint(to: Address, value: u64, block: u64) -> TransferRecord {
    TransferRecord::new(Address::ZERO, to, U256::from(value), block)
}

pub fn transfer(from: Address, to: Address, value: u64, block: u64) -> TransferRecord {
    TransferRecord::new(from, to, U256::from(value), block)
}

/// Scripted transfer-log source that pages by block span like the RPC reader.
pub struct MockChain {
    transfers: Vec<TransferRecord>,
    head: AtomicU64,
    creation_block: Option<u64>,
    creation_fails: bool,
    supply: Mutex<Option<U256>>,
    fail_after_pages: Option<usize>,
    undecodable_block: Option<u64>,
    lookbehind: u64,
    page_calls: AtomicUsize,
}

impl MockChain {
    pub fn new(transfers: Vec<TransferRecord>, head: u64) -> Self {
        Self {
            transfers,
            head: AtomicU64::new(head),
            creation_block: Some(0),
            creation_fails: false,
            supply: Mutex::new(None),
            fail_after_pages: None,
            undecodable_block: None,
            lookbehind: 0,
            page_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_supply(self, supply: u64) -> Self {
        *self.supply.lock().unwrap() = Some(U256::from(supply));
        self
    }

    pub fn with_creation_block(mut self, block: Option<u64>) -> Self {
        self.creation_block = block;
        self
    }

    pub fn with_failing_creation_lookup(mut self) -> Self {
        self.creation_fails = true;
        self
    }

    /// Page requests after the first `pages` fail.
    pub fn failing_after(mut self, pages: usize) -> Self {
        self.fail_after_pages = Some(pages);
        self
    }

    /// The page covering `block` holds a log that is not an ERC-20 transfer.
    pub fn with_undecodable_log_at(mut self, block: u64) -> Self {
        self.undecodable_block = Some(block);
        self
    }

    /// Pages also return transfers from `blocks` blocks before their start.
    pub fn with_overlapping_pages(mut self, blocks: u64) -> Self {
        self.lookbehind = blocks;
        self
    }

    pub fn set_head(&self, head: u64) {
        self.head.store(head, Ordering::SeqCst);
    }

    pub fn page_calls(&self) -> usize {
        self.page_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainReader for MockChain {
    async fn latest_block(&self, _chain_id: u64) -> SyncResult<u64> {
        Ok(self.head.load(Ordering::SeqCst))
    }

    async fn transfer_page(
        &self,
        _chain_id: u64,
        request: &PageRequest,
    ) -> SyncResult<TransferPage> {
        let call = self.page_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_after_pages.is_some_and(|limit| call >= limit) {
            return Err(SyncError::Upstream("429 Too Many Requests".to_string()));
        }

        let start = match &request.page_key {
            Some(key) => key.as_str().parse::<u64>().unwrap(),
            None => request.from_block,
        };
        let end = (start + request.page_size - 1).min(request.to_block);

        if self
            .undecodable_block
            .is_some_and(|block| (start..=end).contains(&block))
        {
            let total = 1 + self
                .transfers
                .iter()
                .filter(|t| (start..=end).contains(&t.block_number))
                .count();
            return Err(SyncError::UndecodableLogs {
                from_block: start,
                to_block: end,
                failed: 1,
                total,
            });
        }

        let first = start.saturating_sub(self.lookbehind);
        let transfers = self
            .transfers
            .iter()
            .filter(|t| t.block_number >= first && t.block_number <= end)
            .copied()
            .collect();

        Ok(TransferPage {
            transfers,
            next_page_key: (end < request.to_block).then(|| PageKey::new((end + 1).to_string())),
            scanned_to: end,
        })
    }

    async fn creation_block(&self, _chain_id: u64, _token: Address) -> SyncResult<Option<u64>> {
        if self.creation_fails {
            return Err(SyncError::Upstream("eth_getCode unavailable".to_string()));
        }
        Ok(self.creation_block)
    }

    async fn total_supply(&self, _chain_id: u64, _token: Address) -> SyncResult<Option<U256>> {
        Ok(*self.supply.lock().unwrap())
    }
}

pub fn fast_settings(page_size: u64) -> SyncSettings {
    SyncSettings {
        page_size,
        page_delay: Duration::ZERO,
        pool_delay: Duration::ZERO,
        ..SyncSettings::default()
    }
}

pub struct Harness {
    pub chain: Arc<MockChain>,
    pub pools: Arc<InMemoryPoolRegistry>,
    pub store: Arc<InMemorySnapshotStore>,
    pub service: HolderSyncService,
}

pub fn harness(chain: MockChain, settings: SyncSettings) -> Harness {
    let chain = Arc::new(chain);
    let pools = Arc::new(InMemoryPoolRegistry::new([PoolInfo::new(
        POOL_ID, CHAIN_ID, TOKEN,
    )]));
    let store = Arc::new(InMemorySnapshotStore::new());
    let service = HolderSyncService::new(chain.clone(), pools.clone(), store.clone(), settings);

    Harness {
        chain,
        pools,
        store,
        service,
    }
}
