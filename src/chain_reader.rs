use crate::deployment::find_deployment_block;
use crate::error::{SyncError, SyncResult};
use crate::events::{Transfer, TransferRecord, transfer_record_from_log};
use crate::repository::{Database, Token, TokenRepository};
use crate::rpc::RpcClient;
use alloy::rpc::types::Log;
use alloy::sol_types::SolEvent;
use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Opaque continuation token returned by a transfer-log source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageKey(String);

impl PageKey {
    pub fn new(key: impl Into<String>) -> Self {
        PageKey(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone)]
pub struct PageRequest {
    pub token: Address,
    pub from_block: u64,
    pub to_block: u64,
    pub page_size: u64,
    pub page_key: Option<PageKey>,
}

#[derive(Debug, Clone, Default)]
pub struct TransferPage {
    pub transfers: Vec<TransferRecord>,
    pub next_page_key: Option<PageKey>,
    /// Last block whose transfers are fully contained in this and earlier pages.
    pub scanned_to: u64,
}

/// Everything the holder sync reads from a chain.
#[async_trait]
pub trait ChainReader: Send + Sync {
    async fn latest_block(&self, chain_id: u64) -> SyncResult<u64>;

    async fn transfer_page(&self, chain_id: u64, request: &PageRequest)
    -> SyncResult<TransferPage>;

    async fn creation_block(&self, chain_id: u64, token: Address) -> SyncResult<Option<u64>>;

    async fn total_supply(&self, chain_id: u64, token: Address) -> SyncResult<Option<U256>>;
}

/// [`ChainReader`] over JSON-RPC, paging `eth_getLogs` by block span.
pub struct RpcChainReader {
    clients: HashMap<u64, RpcClient>,
    deployment_cache: Option<Database>,
}

impl RpcChainReader {
    pub fn new(clients: HashMap<u64, RpcClient>) -> Self {
        Self {
            clients,
            deployment_cache: None,
        }
    }

    pub fn from_endpoints(endpoints: &HashMap<u64, Vec<String>>) -> anyhow::Result<Self> {
        let mut clients = HashMap::new();
        for (chain_id, urls) in endpoints {
            clients.insert(*chain_id, RpcClient::new(urls)?);
            info!(
                chain_id,
                endpoints = urls.len(),
                "RPC client configured"
            );
        }
        Ok(Self::new(clients))
    }

    /// Remembers discovered deployment blocks in the `tokens` table.
    pub fn with_deployment_cache(mut self, db: Database) -> Self {
        self.deployment_cache = Some(db);
        self
    }

    fn client(&self, chain_id: u64) -> SyncResult<&RpcClient> {
        self.clients.get(&chain_id).ok_or_else(|| {
            SyncError::Configuration(format!(
                "no RPC endpoint configured for chain {chain_id} (set RPC_URLS_{chain_id})"
            ))
        })
    }

    async fn cached_deployment_block(&self, chain_id: u64, token: Address) -> Option<u64> {
        let db = self.deployment_cache.as_ref()?;
        match db
            .run(move |conn| TokenRepository::new(conn).get_deployment_block(chain_id, &token))
            .await
        {
            Ok(block) => block,
            Err(e) => {
                warn!(chain_id, token = ?token, error = %e, "Deployment cache read failed");
                None
            }
        }
    }

    async fn cache_deployment_block(&self, chain_id: u64, token: Address, deployment_block: u64) {
        let Some(db) = self.deployment_cache.as_ref() else {
            return;
        };
        let record = Token {
            chain_id,
            address: token,
            deployment_block,
        };
        if let Err(e) = db
            .run(move |conn| TokenRepository::new(conn).insert(&record))
            .await
        {
            warn!(chain_id, token = ?token, error = %e, "Deployment cache write failed");
        }
    }
}

/// Decodes a page of `Transfer` logs. A page with any log that is not an
/// ERC-20 transfer (an ERC-721 `Transfer` shares the topic) is rejected whole,
/// so its blocks are never reported as scanned.
pub fn decode_transfer_logs(
    logs: &[Log],
    from_block: u64,
    to_block: u64,
) -> SyncResult<Vec<TransferRecord>> {
    let mut transfers = Vec::with_capacity(logs.len());
    let mut failed = 0;
    for log in logs {
        match transfer_record_from_log(log) {
            Ok(record) => transfers.push(record),
            Err(e) => {
                if failed == 0 {
                    warn!(
                        from_block,
                        to_block,
                        tx = ?log.transaction_hash,
                        error = %e,
                        "Failed to decode transfer event"
                    );
                }
                failed += 1;
            }
        }
    }

    if failed > 0 {
        return Err(SyncError::UndecodableLogs {
            from_block,
            to_block,
            failed,
            total: logs.len(),
        });
    }
    Ok(transfers)
}

#[async_trait]
impl ChainReader for RpcChainReader {
    async fn latest_block(&self, chain_id: u64) -> SyncResult<u64> {
        self.client(chain_id)?
            .get_latest_block()
            .await
            .map_err(SyncError::upstream)
    }

    async fn transfer_page(
        &self,
        chain_id: u64,
        request: &PageRequest,
    ) -> SyncResult<TransferPage> {
        let client = self.client(chain_id)?;

        let start = match &request.page_key {
            Some(key) => key.as_str().parse::<u64>().map_err(|_| {
                SyncError::Upstream(format!("malformed page key {:?}", key.as_str()))
            })?,
            None => request.from_block,
        };

        if start > request.to_block {
            return Ok(TransferPage {
                scanned_to: request.to_block,
                ..TransferPage::default()
            });
        }

        let span = request.page_size.max(1);
        let end = start.saturating_add(span - 1).min(request.to_block);

        let logs = client
            .get_logs(start, end, request.token, Transfer::SIGNATURE_HASH)
            .await
            .map_err(SyncError::upstream)?;

        let transfers = decode_transfer_logs(&logs, start, end)?;
        debug!(chain_id, start, end, transfers = transfers.len(), "Fetched transfer page");

        Ok(TransferPage {
            transfers,
            next_page_key: (end < request.to_block).then(|| PageKey::new((end + 1).to_string())),
            scanned_to: end,
        })
    }

    async fn creation_block(&self, chain_id: u64, token: Address) -> SyncResult<Option<u64>> {
        let client = self.client(chain_id)?;

        if let Some(block) = self.cached_deployment_block(chain_id, token).await {
            debug!(chain_id, block, "Using cached deployment block");
            return Ok(Some(block));
        }

        let latest_block = client
            .get_latest_block()
            .await
            .map_err(SyncError::upstream)?;
        let found = find_deployment_block(client, token, latest_block)
            .await
            .map_err(SyncError::upstream)?;

        if let Some(block) = found {
            self.cache_deployment_block(chain_id, token, block).await;
        }
        Ok(found)
    }

    async fn total_supply(&self, chain_id: u64, token: Address) -> SyncResult<Option<U256>> {
        let supply = self
            .client(chain_id)?
            .get_total_supply(token)
            .await
            .map_err(SyncError::upstream)?;
        Ok(Some(supply))
    }
}
