use anyhow::{Context, Result};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

/// Shared SQLite handle. Statements run on blocking threads via [`Database::run`].
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn new(db_path: &str) -> Result<Self> {
        let db_path = db_path.strip_prefix("sqlite:").unwrap_or(db_path);
        let conn = Connection::open(db_path).context("Failed to open database")?;
        Self::from_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.with_conn(Self::create_tables)?;
        Ok(db)
    }

    pub fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("Database connection mutex poisoned"))?;
        f(&conn)
    }

    /// Runs `f` against the connection on the blocking thread pool.
    pub async fn run<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || db.with_conn(f)).await?
    }

    fn create_tables(conn: &Connection) -> Result<()> {
        // Deployment block cache for the creation-block lookup
        conn.execute(
            "CREATE TABLE IF NOT EXISTS tokens (
                chain_id INTEGER NOT NULL,
                address TEXT NOT NULL,
                deployment_block INTEGER NOT NULL,
                PRIMARY KEY (chain_id, address)
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS pools (
                pool_id TEXT PRIMARY KEY,
                chain_id INTEGER NOT NULL,
                token_address TEXT,
                symbol TEXT,
                decimals INTEGER
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS holder_snapshots (
                chain_id INTEGER NOT NULL,
                pool_id TEXT NOT NULL,
                token_address TEXT NOT NULL,
                total_supply TEXT,
                updated_at TEXT NOT NULL,
                transfers_processed INTEGER NOT NULL,
                from_block INTEGER NOT NULL,
                to_block INTEGER NOT NULL,
                processing_time_ms INTEGER NOT NULL,
                sync_mode TEXT NOT NULL,
                stop_reason TEXT NOT NULL,
                PRIMARY KEY (chain_id, pool_id)
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS snapshot_holders (
                chain_id INTEGER NOT NULL,
                pool_id TEXT NOT NULL,
                rank INTEGER NOT NULL,
                address TEXT NOT NULL,
                balance_padded TEXT NOT NULL,
                percentage_bps INTEGER NOT NULL,
                PRIMARY KEY (chain_id, pool_id, rank)
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_pools_chain
             ON pools(chain_id)",
            [],
        )?;

        Ok(())
    }
}
