use super::models::Token;
use alloy_primitives::Address;
use anyhow::Result;
use rusqlite::{OptionalExtension, params};

pub struct TokenRepository<'a> {
    conn: &'a rusqlite::Connection,
}

impl<'a> TokenRepository<'a> {
    const UPSERT_TOKEN: &'static str =
        "INSERT OR REPLACE INTO tokens (chain_id, address, deployment_block)
         VALUES (?1, ?2, ?3)";

    const GET_DEPLOYMENT_BLOCK: &'static str =
        "SELECT deployment_block FROM tokens WHERE chain_id = ?1 AND address = ?2";

    pub fn new(conn: &'a rusqlite::Connection) -> Self {
        Self { conn }
    }

    pub fn insert(&self, token: &Token) -> Result<()> {
        self.conn.execute(
            Self::UPSERT_TOKEN,
            params![
                token.chain_id,
                format!("{:?}", token.address),
                token.deployment_block
            ],
        )?;
        Ok(())
    }

    pub fn get_deployment_block(&self, chain_id: u64, address: &Address) -> Result<Option<u64>> {
        let block: Option<u64> = self
            .conn
            .query_row(
                Self::GET_DEPLOYMENT_BLOCK,
                params![chain_id, format!("{:?}", address)],
                |row| row.get(0),
            )
            .optional()?;
        Ok(block)
    }
}
