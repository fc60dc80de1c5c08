use crate::registry::PoolInfo;
use alloy_primitives::Address;
use anyhow::Result;
use rusqlite::{OptionalExtension, Row, params};
use std::str::FromStr;

pub struct PoolRepository<'a> {
    conn: &'a rusqlite::Connection,
}

impl<'a> PoolRepository<'a> {
    const UPSERT_POOL: &'static str =
        "INSERT INTO pools (pool_id, chain_id, token_address, symbol, decimals)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(pool_id) DO UPDATE SET
            chain_id = excluded.chain_id,
            token_address = excluded.token_address,
            symbol = excluded.symbol,
            decimals = excluded.decimals";

    const SELECT_POOL: &'static str =
        "SELECT pool_id, chain_id, token_address, symbol, decimals FROM pools";

    pub fn new(conn: &'a rusqlite::Connection) -> Self {
        Self { conn }
    }

    pub fn upsert(&self, pool: &PoolInfo) -> Result<()> {
        self.conn.execute(
            Self::UPSERT_POOL,
            params![
                pool.pool_id,
                pool.chain_id,
                pool.token_address.map(|address| format!("{address:?}")),
                pool.symbol,
                pool.decimals,
            ],
        )?;
        Ok(())
    }

    pub fn get(&self, pool_id: &str) -> Result<Option<PoolInfo>> {
        let query = format!("{} WHERE pool_id = ?1", Self::SELECT_POOL);
        let pool = self
            .conn
            .query_row(&query, params![pool_id], Self::row_to_pool)
            .optional()?;
        Ok(pool)
    }

    pub fn list(&self) -> Result<Vec<PoolInfo>> {
        let query = format!("{} ORDER BY pool_id", Self::SELECT_POOL);
        let mut stmt = self.conn.prepare(&query)?;
        let pools = stmt
            .query_map([], Self::row_to_pool)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(pools)
    }

    fn row_to_pool(row: &Row) -> rusqlite::Result<PoolInfo> {
        let token_address = row
            .get::<_, Option<String>>(2)?
            .filter(|raw| !raw.is_empty())
            .map(|raw| {
                Address::from_str(&raw).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        2,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })
            })
            .transpose()?;

        Ok(PoolInfo {
            pool_id: row.get(0)?,
            chain_id: row.get(1)?,
            token_address,
            symbol: row.get(3)?,
            decimals: row.get(4)?,
        })
    }
}
