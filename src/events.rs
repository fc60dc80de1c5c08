use alloy::rpc::types::Log;
use alloy::sol;
use alloy::sol_types::SolEvent;
use alloy_primitives::{Address, U256};
use anyhow::Context;

sol! {
    event Transfer(address indexed from, address indexed to, uint256 value);

    function totalSupply() external view returns (uint256);
}

/// A decoded ERC-20 transfer, reduced to what balance netting needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferRecord {
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub block_number: u64,
}

impl TransferRecord {
    pub fn new(from: Address, to: Address, value: U256, block_number: u64) -> Self {
        Self {
            from,
            to,
            value,
            block_number,
        }
    }
}

pub fn decode_transfer_event(log: &Log) -> anyhow::Result<Transfer> {
    let log_data = log.data();
    let decoded = Transfer::decode_raw_log(log.topics(), &log_data.data)?;
    Ok(decoded)
}

/// Decodes a `Transfer` log. Pending logs without a block number are rejected.
pub fn transfer_record_from_log(log: &Log) -> anyhow::Result<TransferRecord> {
    let event = decode_transfer_event(log)?;
    let block_number = log
        .block_number
        .context("transfer log is missing its block number")?;

    Ok(TransferRecord::new(event.from, event.to, event.value, block_number))
}
