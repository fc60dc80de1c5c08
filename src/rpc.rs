use crate::events::totalSupplyCall;
use alloy::providers::fillers::FillProvider;
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::{BlockNumberOrTag, Filter, Log, TransactionRequest};
use alloy::sol_types::SolCall;
use alloy_primitives::{Address, B256, Bytes, U256};
use anyhow::{Context, Result};
use regex::Regex;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::timeout;
use tokio_retry::Retry;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{debug, info, warn};

type AlloyFullProvider = FillProvider<
    alloy::providers::fillers::JoinFill<
        alloy::providers::Identity,
        alloy::providers::fillers::JoinFill<
            alloy::providers::fillers::GasFiller,
            alloy::providers::fillers::JoinFill<
                alloy::providers::fillers::BlobGasFiller,
                alloy::providers::fillers::JoinFill<
                    alloy::providers::fillers::NonceFiller,
                    alloy::providers::fillers::ChainIdFiller,
                >,
            >,
        >,
    >,
    alloy::providers::RootProvider,
>;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const MAX_RESULTS_ERROR: &str = "exceeds max results";

/// JSON-RPC client for one chain, rotating across its endpoints on failure.
#[derive(Clone)]
pub struct RpcClient {
    providers: Vec<AlloyFullProvider>,
    urls: Vec<String>,
    current_provider: Arc<AtomicUsize>,
    max_retries: usize,
}

impl RpcClient {
    pub fn new(rpc_urls: &[String]) -> Result<Self> {
        if rpc_urls.is_empty() {
            return Err(anyhow::anyhow!("At least one RPC URL must be provided"));
        }

        let mut providers = Vec::new();
        for url in rpc_urls {
            let parsed_url = url
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid RPC URL: {}", url))?;
            let provider: AlloyFullProvider = ProviderBuilder::new().connect_http(parsed_url);
            providers.push(provider);
        }

        Ok(RpcClient {
            providers,
            urls: rpc_urls.to_vec(),
            current_provider: Arc::new(AtomicUsize::new(0)),
            max_retries: 5,
        })
    }

    pub fn endpoint_count(&self) -> usize {
        self.urls.len()
    }

    fn get_provider(&self) -> &AlloyFullProvider {
        let index = self.current_provider.load(Ordering::Relaxed) % self.providers.len();
        &self.providers[index]
    }

    pub fn get_current_url(&self) -> &str {
        let index = self.current_provider.load(Ordering::Relaxed) % self.urls.len();
        &self.urls[index]
    }

    pub fn rotate_provider(&self) {
        let current = self.current_provider.load(Ordering::Relaxed);
        let next = (current + 1) % self.providers.len();
        self.current_provider.store(next, Ordering::Relaxed);

        if self.providers.len() > 1 {
            debug!("Rotating to RPC provider #{}", next);
        }
    }

    fn get_retry_strategy(&self) -> impl Iterator<Item = Duration> {
        ExponentialBackoff::from_millis(100)
            .factor(2)
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(self.max_retries)
    }

    /// Runs `call` against the current provider with timeout, backoff and
    /// endpoint rotation on every failed attempt.
    async fn with_retry<T, E, F, Fut>(&self, method: &'static str, call: F) -> Result<T>
    where
        F: Fn(AlloyFullProvider) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Display,
    {
        Retry::spawn(self.get_retry_strategy(), || {
            let attempt = call(self.get_provider().clone());
            async move {
                match timeout(REQUEST_TIMEOUT, attempt).await {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(e)) => {
                        warn!(
                            method,
                            url = self.get_current_url(),
                            error = %e,
                            "RPC error, rotating provider"
                        );
                        self.rotate_provider();
                        Err(anyhow::anyhow!("{} failed: {}", method, e))
                    }
                    Err(_) => {
                        warn!(
                            method,
                            url = self.get_current_url(),
                            "Request timeout after {} seconds, rotating provider",
                            REQUEST_TIMEOUT.as_secs()
                        );
                        self.rotate_provider();
                        Err(anyhow::anyhow!(
                            "{} timed out after {} seconds",
                            method,
                            REQUEST_TIMEOUT.as_secs()
                        ))
                    }
                }
            }
        })
        .await
    }

    pub async fn get_latest_block(&self) -> Result<u64> {
        self.with_retry("eth_blockNumber", |provider| async move {
            provider.get_block_number().await
        })
        .await
    }

    pub async fn get_code_at_block(&self, address: Address, block_number: u64) -> Result<Bytes> {
        self.with_retry("eth_getCode", move |provider| async move {
            provider
                .get_code_at(address)
                .block_id(BlockNumberOrTag::Number(block_number).into())
                .await
        })
        .await
    }

    /// Reads `totalSupply()` from an ERC-20 contract at the latest block.
    pub async fn get_total_supply(&self, token: Address) -> Result<U256> {
        let calldata = Bytes::from(totalSupplyCall {}.abi_encode());

        let raw = self
            .with_retry("eth_call", |provider| {
                let tx = TransactionRequest::default()
                    .to(token)
                    .input(calldata.clone().into());
                async move { provider.call(tx).await }
            })
            .await?;

        let supply = totalSupplyCall::abi_decode_returns(&raw)
            .with_context(|| format!("Failed to decode totalSupply() of {token:?}"))?;
        Ok(supply)
    }

    /// One `eth_getLogs` call. A "max results" rejection is returned as the
    /// inner error so it is not retried or counted against the endpoint.
    async fn get_logs_internal(
        &self,
        from_block: u64,
        to_block: u64,
        contract_address: Address,
        topic0: B256,
    ) -> Result<std::result::Result<Vec<Log>, String>> {
        let filter = Filter::new()
            .address(contract_address)
            .event_signature(topic0)
            .from_block(from_block)
            .to_block(to_block);

        self.with_retry("eth_getLogs", |provider| {
            let filter = filter.clone();
            async move {
                match provider.get_logs(&filter).await {
                    Ok(logs) => Ok(Ok(logs)),
                    Err(e) if e.to_string().contains(MAX_RESULTS_ERROR) => {
                        debug!(
                            "Max results exceeded for blocks {}-{}, will split range",
                            from_block, to_block
                        );
                        Ok(Err(e.to_string()))
                    }
                    Err(e) => Err(e),
                }
            }
        })
        .await
    }

    fn parse_max_results_error(error_str: &str) -> Option<(u64, u64)> {
        let re = Regex::new(r"retry with the range (\d+)-(\d+)").ok()?;
        let captures = re.captures(error_str)?;

        let from = captures.get(1)?.as_str().parse().ok()?;
        let to = captures.get(2)?.as_str().parse().ok()?;

        Some((from, to))
    }

    /// Fetches every matching log in `[from_block, to_block]`, narrowing the
    /// range whenever the provider asks for a smaller one.
    pub async fn get_logs(
        &self,
        from_block: u64,
        to_block: u64,
        contract_address: Address,
        topic0: B256,
    ) -> Result<Vec<Log>> {
        let mut all_logs = Vec::new();
        let mut current_from = from_block;

        while current_from <= to_block {
            match self
                .get_logs_internal(current_from, to_block, contract_address, topic0)
                .await?
            {
                Ok(logs) => {
                    all_logs.extend(logs);
                    break;
                }
                Err(error_str) => {
                    let (suggested_from, suggested_to) =
                        Self::parse_max_results_error(&error_str)
                            .filter(|(from, to)| *from == current_from && to >= from)
                            .ok_or_else(|| anyhow::anyhow!("{}", error_str))?;

                    info!(
                        "Hit max results limit for blocks {}-{}, splitting at block {}",
                        current_from, to_block, suggested_to
                    );

                    let logs = self
                        .get_logs_internal(suggested_from, suggested_to, contract_address, topic0)
                        .await?
                        .map_err(|e| anyhow::anyhow!("{}", e))?;

                    all_logs.extend(logs);
                    current_from = suggested_to + 1;
                }
            }
        }

        Ok(all_logs)
    }
}
