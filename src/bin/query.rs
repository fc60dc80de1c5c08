use anyhow::Result;
use clap::{Parser, Subcommand};
use top_holders::config::Config;
use top_holders::query::commands::{NewPool, cmd_add_pool, cmd_pools, cmd_snapshot};
use top_holders::query::formatters::OutputFormat;
use top_holders::repository::{Database, SqliteStore};
use top_holders::snapshot_store;

#[derive(Parser)]
#[command(name = "query")]
#[command(about = "Inspect pools and stored top-holder snapshots", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "table")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the latest snapshot for a pool
    Snapshot { pool_id: String },
    /// List registered pools
    Pools,
    /// Register or update a pool
    AddPool {
        pool_id: String,

        #[arg(long)]
        chain_id: u64,

        #[arg(long)]
        token: String,

        #[arg(long)]
        symbol: Option<String>,

        #[arg(long)]
        decimals: Option<u8>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let format = OutputFormat::from(cli.format.as_str());

    let config = Config::from_env()?;

    let db = Database::new(&config.database_url)?;
    let registry = SqliteStore::new(db.clone());

    match cli.command {
        Commands::Snapshot { pool_id } => {
            let store = snapshot_store(&config, &db);
            cmd_snapshot(&registry, store.as_ref(), &pool_id, &format).await?;
        }
        Commands::Pools => {
            cmd_pools(&registry, &format).await?;
        }
        Commands::AddPool {
            pool_id,
            chain_id,
            token,
            symbol,
            decimals,
        } => {
            let pool = NewPool {
                pool_id,
                chain_id,
                token,
                symbol,
                decimals,
            };
            cmd_add_pool(&registry, pool).await?;
        }
    }

    Ok(())
}
