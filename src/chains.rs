/// Days of history scanned when neither a prior snapshot nor a creation block
/// anchors the start of a sync.
pub const RECENT_WINDOW_DAYS: u64 = 7;

const DEFAULT_BLOCKS_PER_DAY: u64 = 7_200;

/// Approximate blocks produced per day, derived from each chain's block time.
pub fn blocks_per_day(chain_id: u64) -> u64 {
    match chain_id {
        // Ethereum mainnet / Sepolia (12s)
        1 | 11_155_111 => 7_200,
        // BNB Smart Chain (3s)
        56 => 28_800,
        // Gnosis (5s)
        100 => 17_280,
        // Optimism, Polygon, Base, Avalanche C-Chain (2s)
        10 | 137 | 8_453 | 43_114 => 43_200,
        // Arbitrum One (~0.25s)
        42_161 => 345_600,
        _ => DEFAULT_BLOCKS_PER_DAY,
    }
}

pub fn chain_name(chain_id: u64) -> &'static str {
    match chain_id {
        1 => "ethereum",
        10 => "optimism",
        56 => "bsc",
        100 => "gnosis",
        137 => "polygon",
        8_453 => "base",
        42_161 => "arbitrum",
        43_114 => "avalanche",
        11_155_111 => "sepolia",
        _ => "unknown",
    }
}

/// Start block used when nothing better is known: one week behind the head.
pub fn recent_window_start(chain_id: u64, latest_block: u64) -> u64 {
    latest_block.saturating_sub(blocks_per_day(chain_id) * RECENT_WINDOW_DAYS)
}
