use alloy_primitives::Address;

#[derive(Debug, Clone)]
pub struct Token {
    pub chain_id: u64,
    pub address: Address,
    pub deployment_block: u64,
}
