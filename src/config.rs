use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const RPC_URLS_PREFIX: &str = "RPC_URLS_";

/// Pacing and bounds for a single holder sync.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Blocks covered by one transfer-log page.
    pub page_size: u64,
    /// Hard cap on pages fetched per sync.
    pub max_pages: usize,
    /// Pause between page requests.
    pub page_delay: Duration,
    /// Pause between pools in a batch sync.
    pub pool_delay: Duration,
    /// Wall-clock budget for pagination; `None` means unbounded.
    pub deadline: Option<Duration>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            page_size: 2_000,
            max_pages: 100,
            page_delay: Duration::from_millis(200),
            pool_delay: Duration::from_secs(2),
            deadline: Some(Duration::from_secs(600)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// RPC endpoints keyed by chain id.
    pub chain_endpoints: HashMap<u64, Vec<String>>,
    /// When set, snapshots are written as JSON files here instead of SQLite.
    pub snapshot_dir: Option<PathBuf>,
    pub sync: SyncSettings,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_vars(std::env::vars())
    }

    pub fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Result<Self> {
        let vars: HashMap<String, String> = vars.into_iter().collect();

        let database_url = vars
            .get("DATABASE_URL")
            .cloned()
            .unwrap_or_else(|| "sqlite:./holders.db".to_string());

        let mut chain_endpoints: HashMap<u64, Vec<String>> = HashMap::new();
        for (key, value) in &vars {
            let Some(chain) = key.strip_prefix(RPC_URLS_PREFIX) else {
                continue;
            };
            let chain_id: u64 = chain
                .parse()
                .with_context(|| format!("Invalid chain id in {key}"))?;
            let urls = split_urls(value);
            if !urls.is_empty() {
                chain_endpoints.insert(chain_id, urls);
            }
        }

        // Single-endpoint form kept for mainnet-only deployments
        if let Some(url) = vars.get("JSON_RPC_URL").map(|url| url.trim()) {
            let mainnet = chain_endpoints.entry(1).or_default();
            if !url.is_empty() && !mainnet.iter().any(|existing| existing == url) {
                mainnet.push(url.to_string());
            }
        }
        chain_endpoints.retain(|_, urls| !urls.is_empty());

        let snapshot_dir = vars
            .get("SNAPSHOT_DIR")
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from);

        let defaults = SyncSettings::default();
        let page_size: u64 = parse_var(&vars, "SYNC_PAGE_BLOCKS", defaults.page_size)?;
        let max_pages: usize = parse_var(&vars, "SYNC_MAX_PAGES", defaults.max_pages)?;
        if page_size == 0 || max_pages == 0 {
            anyhow::bail!("SYNC_PAGE_BLOCKS and SYNC_MAX_PAGES must be greater than zero");
        }

        let page_delay_ms = parse_var(&vars, "SYNC_PAGE_DELAY_MS", 200u64)?;
        let pool_delay_ms = parse_var(&vars, "SYNC_POOL_DELAY_MS", 2_000u64)?;
        let deadline_secs = parse_var(&vars, "SYNC_DEADLINE_SECS", 600u64)?;

        Ok(Config {
            database_url,
            chain_endpoints,
            snapshot_dir,
            sync: SyncSettings {
                page_size,
                max_pages,
                page_delay: Duration::from_millis(page_delay_ms),
                pool_delay: Duration::from_millis(pool_delay_ms),
                deadline: (deadline_secs > 0).then(|| Duration::from_secs(deadline_secs)),
            },
        })
    }

    pub fn configured_chains(&self) -> Vec<u64> {
        let mut chains: Vec<u64> = self.chain_endpoints.keys().copied().collect();
        chains.sort_unstable();
        chains
    }
}

fn split_urls(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_var<T>(vars: &HashMap<String, String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match vars.get(key).map(|value| value.trim()) {
        Some(value) if !value.is_empty() => value
            .parse()
            .with_context(|| format!("Invalid {key} value: {value}")),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_vars(vars(&[])).unwrap();
        assert_eq!(config.database_url, "sqlite:./holders.db");
        assert!(config.chain_endpoints.is_empty());
        assert!(config.snapshot_dir.is_none());
        assert_eq!(config.sync.page_size, 2_000);
        assert_eq!(config.sync.max_pages, 100);
        assert_eq!(config.sync.page_delay, Duration::from_millis(200));
        assert_eq!(config.sync.deadline, Some(Duration::from_secs(600)));
        assert!(config.sync.pool_delay > config.sync.page_delay);
    }

    #[test]
    fn test_per_chain_endpoints() {
        let config = Config::from_vars(vars(&[
            ("RPC_URLS_8453", "https://base-a.example, https://base-b.example"),
            ("RPC_URLS_1", "https://eth.example"),
            ("JSON_RPC_URL", "https://eth-legacy.example"),
            ("RPC_URLS_10", " , "),
        ]))
        .unwrap();

        assert_eq!(config.configured_chains(), vec![1, 8_453]);
        assert_eq!(
            config.chain_endpoints[&8_453],
            vec!["https://base-a.example", "https://base-b.example"]
        );
        assert_eq!(
            config.chain_endpoints[&1],
            vec!["https://eth.example", "https://eth-legacy.example"]
        );
    }

    #[test]
    fn test_sync_overrides_and_disabled_deadline() {
        let config = Config::from_vars(vars(&[
            ("SYNC_PAGE_BLOCKS", "500"),
            ("SYNC_MAX_PAGES", "7"),
            ("SYNC_PAGE_DELAY_MS", "0"),
            ("SYNC_DEADLINE_SECS", "0"),
            ("SNAPSHOT_DIR", "/var/lib/holders"),
        ]))
        .unwrap();

        assert_eq!(config.sync.page_size, 500);
        assert_eq!(config.sync.max_pages, 7);
        assert_eq!(config.sync.page_delay, Duration::ZERO);
        assert_eq!(config.sync.deadline, None);
        assert_eq!(config.snapshot_dir, Some(PathBuf::from("/var/lib/holders")));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(Config::from_vars(vars(&[("RPC_URLS_mainnet", "https://x")])).is_err());
        assert!(Config::from_vars(vars(&[("SYNC_MAX_PAGES", "lots")])).is_err());
        assert!(Config::from_vars(vars(&[("SYNC_PAGE_BLOCKS", "0")])).is_err());
    }
}
