use alloy_primitives::{Address, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Holders kept per snapshot.
pub const TOP_HOLDER_LIMIT: usize = 20;

const BASIS_POINTS: u64 = 10_000;

/// Share of total supply in basis points (two implied decimals of a percent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SupplyShare(u32);

impl SupplyShare {
    pub const ZERO: SupplyShare = SupplyShare(0);
    pub const FULL: SupplyShare = SupplyShare(BASIS_POINTS as u32);

    pub fn from_basis_points(basis_points: u32) -> Self {
        SupplyShare(basis_points.min(BASIS_POINTS as u32))
    }

    /// `balance * 10000 / supply`, rounded half up. Absent or zero supply
    /// yields zero; a balance above supply is clamped to 100%.
    pub fn of(balance: U256, total_supply: Option<U256>) -> Self {
        let Some(supply) = total_supply.filter(|s| !s.is_zero()) else {
            return Self::ZERO;
        };
        if balance >= supply {
            return Self::FULL;
        }

        let scale = U256::from(BASIS_POINTS);
        let (mut balance, mut supply) = (balance, supply);
        // Only near-2^256 values overflow; dropping low bits keeps the ratio.
        let basis_points = loop {
            let rounded = balance
                .checked_mul(scale)
                .and_then(|scaled| scaled.checked_add(supply >> 1usize));
            if let Some(numerator) = rounded {
                break numerator / supply;
            }
            balance >>= 64usize;
            supply >>= 64usize;
        };

        let basis_points = u64::try_from(basis_points).unwrap_or(BASIS_POINTS);
        Self::from_basis_points(basis_points.min(BASIS_POINTS) as u32)
    }

    pub fn basis_points(self) -> u32 {
        self.0
    }

    pub fn as_percent(self) -> f64 {
        f64::from(self.0) / 100.0
    }
}

impl fmt::Display for SupplyShare {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl Serialize for SupplyShare {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_percent())
    }
}

impl<'de> Deserialize<'de> for SupplyShare {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let percent = f64::deserialize(deserializer)?;
        if !(0.0..=100.0).contains(&percent) {
            return Err(serde::de::Error::custom(format!(
                "percentage {percent} is outside 0..=100"
            )));
        }
        Ok(SupplyShare::from_basis_points((percent * 100.0).round() as u32))
    }
}

/// Serde adapter writing `U256` as a base-10 string instead of alloy's hex.
pub mod decimal_u256 {
    use alloy_primitives::U256;
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let raw = String::deserialize(deserializer)?;
        U256::from_str_radix(&raw, 10).map_err(de::Error::custom)
    }

    pub mod option {
        use alloy_primitives::U256;
        use serde::{Deserialize, Deserializer, Serializer, de};

        pub fn serialize<S: Serializer>(
            value: &Option<U256>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(value) => serializer.serialize_some(&value.to_string()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<U256>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|raw| U256::from_str_radix(&raw, 10).map_err(de::Error::custom))
                .transpose()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Holder {
    pub address: Address,
    #[serde(with = "decimal_u256")]
    pub balance: U256,
    pub percentage_of_supply: SupplyShare,
}

/// Which rule picked the first block of a sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Resumed one block after the previous snapshot.
    Incremental,
    /// Replayed from the token's deployment block.
    CreationBlock,
    /// No anchor known; scanned a recent window behind the head.
    RecentWindow,
}

/// Why pagination over the transfer log ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Exhausted,
    PageCap,
    UpstreamError,
    /// A page held logs that did not decode as ERC-20 transfers.
    UndecodableLogs,
    Deadline,
}

macro_rules! str_enum {
    ($ty:ident { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $name),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = anyhow::Error;

            fn from_str(s: &str) -> anyhow::Result<Self> {
                match s {
                    $($name => Ok($ty::$variant),)+
                    other => Err(anyhow::anyhow!(
                        "unknown {} value: {}",
                        stringify!($ty),
                        other
                    )),
                }
            }
        }
    };
}

str_enum!(SyncMode {
    Incremental => "incremental",
    CreationBlock => "creation_block",
    RecentWindow => "recent_window",
});

str_enum!(StopReason {
    Exhausted => "exhausted",
    PageCap => "page_cap",
    UpstreamError => "upstream_error",
    UndecodableLogs => "undecodable_logs",
    Deadline => "deadline",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    pub chain_id: u64,
    pub pool_id: String,
    pub transfers_processed: u64,
    pub from_block: u64,
    /// Last block the transfer log was scanned through.
    pub to_block: u64,
    pub processing_time_ms: u64,
    pub sync_mode: SyncMode,
    pub stop_reason: StopReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub updated_at: DateTime<Utc>,
    pub token_address: Address,
    #[serde(with = "decimal_u256::option", default)]
    pub total_supply: Option<U256>,
    pub holders: Vec<Holder>,
    pub metadata: SnapshotMetadata,
}

impl Snapshot {
    /// False when pagination stopped before reaching the chain head, so the
    /// holder list may be missing transfers.
    pub fn is_complete(&self) -> bool {
        self.metadata.stop_reason == StopReason::Exhausted
    }
}

/// Orders balances descending (ties by ascending address), keeps the first
/// `limit`, and attaches each holder's share of `total_supply`.
pub fn rank_holders(
    mut balances: Vec<(Address, U256)>,
    total_supply: Option<U256>,
    limit: usize,
) -> Vec<Holder> {
    balances.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    balances.truncate(limit);

    balances
        .into_iter()
        .map(|(address, balance)| Holder {
            address,
            balance,
            percentage_of_supply: SupplyShare::of(balance, total_supply),
        })
        .collect()
}
