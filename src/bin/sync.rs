use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use top_holders::config::Config;
use top_holders::repository::{Database, SqliteStore};
use top_holders::{HolderSyncService, RpcChainReader, snapshot_store};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "holder-sync")]
#[command(about = "Reconstruct top token holders from ERC20 transfer logs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync a single pool
    Pool { pool_id: String },
    /// Sync every registered pool once
    All,
    /// Sync every registered pool on a fixed interval until interrupted
    Watch {
        #[arg(long, default_value = "300")]
        interval_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = Config::from_env()?;
    if config.chain_endpoints.is_empty() {
        anyhow::bail!("No RPC endpoints configured; set RPC_URLS_<CHAIN_ID> or JSON_RPC_URL");
    }
    info!(chains = ?config.configured_chains(), "Configuration loaded");

    let db = Database::new(&config.database_url)?;
    info!("Database initialized");

    let chain = RpcChainReader::from_endpoints(&config.chain_endpoints)?
        .with_deployment_cache(db.clone());
    let service = HolderSyncService::new(
        Arc::new(chain),
        Arc::new(SqliteStore::new(db.clone())),
        snapshot_store(&config, &db),
        config.sync.clone(),
    );

    match cli.command {
        Commands::Pool { pool_id } => {
            let snapshot = service.sync_top_holders(&pool_id).await?;
            info!(
                pool_id,
                holders = snapshot.holders.len(),
                to_block = snapshot.metadata.to_block,
                stop_reason = %snapshot.metadata.stop_reason,
                "Sync finished"
            );
        }
        Commands::All => {
            let report = service.sync_all_pools().await?;
            if !report.is_clean() {
                let total = report.failed.len() + report.synced.len();
                anyhow::bail!("{} of {} pools failed to sync", report.failed.len(), total);
            }
        }
        Commands::Watch { interval_secs } => {
            let interval = Duration::from_secs(interval_secs.max(1));
            info!(interval_secs = interval.as_secs(), "Watching pools");
            loop {
                if let Err(e) = service.sync_all_pools().await {
                    error!("Batch sync error: {}", e);
                }

                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = tokio::signal::ctrl_c() => {
                        info!("Shutdown signal received");
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}
