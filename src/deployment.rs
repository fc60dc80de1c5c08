use crate::rpc::RpcClient;
use alloy_primitives::Address;
use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info};

/// Answers whether an address had contract code at a given block.
#[async_trait]
pub trait CodeProbe: Sync {
    async fn has_code_at(&self, address: Address, block_number: u64) -> Result<bool>;
}

#[async_trait]
impl CodeProbe for RpcClient {
    async fn has_code_at(&self, address: Address, block_number: u64) -> Result<bool> {
        let code = self.get_code_at_block(address, block_number).await?;
        Ok(!code.is_empty())
    }
}

/// Finds the block a contract was deployed in by bisecting its code history.
///
/// Code exists at every block from deployment onward, so the first block with
/// code is the deployment block. Returns `None` when the address has no code
/// at `latest_block` (not a contract, or self-destructed). Requires archive
/// state for `eth_getCode` at historical blocks.
pub async fn find_deployment_block<P>(
    probe: &P,
    address: Address,
    latest_block: u64,
) -> Result<Option<u64>>
where
    P: CodeProbe + ?Sized,
{
    info!("Searching for deployment block of contract {:?}", address);

    if !probe.has_code_at(address, latest_block).await? {
        info!("No code at {:?} as of block {}", address, latest_block);
        return Ok(None);
    }

    let mut left = 0u64;
    let mut right = latest_block;

    while left < right {
        let mid = left + (right - left) / 2;

        if probe.has_code_at(address, mid).await? {
            right = mid;
        } else {
            left = mid + 1;
        }
        debug!(left, right, "Narrowed deployment search");
    }

    info!("Contract {:?} deployed at block {}", address, left);
    Ok(Some(left))
}
