use crate::snapshot::{Holder, Snapshot, SnapshotMetadata, SupplyShare};
use alloy_primitives::{Address, U256};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};
use std::str::FromStr;

pub struct SnapshotRepository<'a> {
    conn: &'a rusqlite::Connection,
}

impl<'a> SnapshotRepository<'a> {
    const UPSERT_SNAPSHOT: &'static str = "INSERT OR REPLACE INTO holder_snapshots (
            chain_id, pool_id, token_address, total_supply, updated_at,
            transfers_processed, from_block, to_block, processing_time_ms,
            sync_mode, stop_reason
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)";

    const DELETE_HOLDERS: &'static str =
        "DELETE FROM snapshot_holders WHERE chain_id = ?1 AND pool_id = ?2";

    const INSERT_HOLDER: &'static str = "INSERT INTO snapshot_holders (
            chain_id, pool_id, rank, address, balance_padded, percentage_bps
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)";

    const SELECT_SNAPSHOT: &'static str = "SELECT token_address, total_supply, updated_at,
            transfers_processed, from_block, to_block, processing_time_ms,
            sync_mode, stop_reason
        FROM holder_snapshots WHERE chain_id = ?1 AND pool_id = ?2";

    const SELECT_HOLDERS: &'static str = "SELECT address, balance_padded, percentage_bps
        FROM snapshot_holders WHERE chain_id = ?1 AND pool_id = ?2
        ORDER BY rank";

    pub fn new(conn: &'a rusqlite::Connection) -> Self {
        Self { conn }
    }

    /// Pad a U256 balance to 78 digits so lexical order matches numeric order.
    /// U256 max is approximately 1.16 * 10^77, so 78 digits is sufficient.
    pub fn pad_balance(balance: &U256) -> String {
        format!("{:0>78}", balance.to_string())
    }

    fn unpad_balance(padded: &str) -> Result<U256> {
        let trimmed = padded.trim_start_matches('0');
        if trimmed.is_empty() {
            return Ok(U256::ZERO);
        }
        U256::from_str_radix(trimmed, 10)
            .map_err(|_| anyhow::anyhow!("Invalid balance format in database: {}", padded))
    }

    /// Replaces the stored snapshot for `(chain_id, pool_id)` atomically.
    pub fn save(&self, chain_id: u64, pool_id: &str, snapshot: &Snapshot) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        let meta = &snapshot.metadata;

        tx.execute(
            Self::UPSERT_SNAPSHOT,
            params![
                chain_id,
                pool_id,
                format!("{:?}", snapshot.token_address),
                snapshot.total_supply.map(|supply| supply.to_string()),
                snapshot.updated_at.to_rfc3339(),
                meta.transfers_processed,
                meta.from_block,
                meta.to_block,
                meta.processing_time_ms,
                meta.sync_mode.as_str(),
                meta.stop_reason.as_str(),
            ],
        )?;

        tx.execute(Self::DELETE_HOLDERS, params![chain_id, pool_id])?;

        {
            let mut stmt = tx.prepare(Self::INSERT_HOLDER)?;
            for (index, holder) in snapshot.holders.iter().enumerate() {
                stmt.execute(params![
                    chain_id,
                    pool_id,
                    index + 1,
                    format!("{:?}", holder.address),
                    Self::pad_balance(&holder.balance),
                    holder.percentage_of_supply.basis_points(),
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    pub fn load(&self, chain_id: u64, pool_id: &str) -> Result<Option<Snapshot>> {
        let row = self
            .conn
            .query_row(Self::SELECT_SNAPSHOT, params![chain_id, pool_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,         // token_address
                    row.get::<_, Option<String>>(1)?, // total_supply
                    row.get::<_, String>(2)?,         // updated_at
                    row.get::<_, u64>(3)?,
                    row.get::<_, u64>(4)?,
                    row.get::<_, u64>(5)?,
                    row.get::<_, u64>(6)?,
                    row.get::<_, String>(7)?,
                    row.get::<_, String>(8)?,
                ))
            })
            .optional()?;

        let Some((
            token_address,
            total_supply,
            updated_at,
            transfers_processed,
            from_block,
            to_block,
            processing_time_ms,
            sync_mode,
            stop_reason,
        )) = row
        else {
            return Ok(None);
        };

        let total_supply = total_supply
            .map(|raw| {
                U256::from_str_radix(&raw, 10)
                    .map_err(|_| anyhow::anyhow!("Invalid total supply in database: {}", raw))
            })
            .transpose()?;

        Ok(Some(Snapshot {
            updated_at: DateTime::parse_from_rfc3339(&updated_at)
                .context("Invalid snapshot timestamp in database")?
                .with_timezone(&Utc),
            token_address: Address::from_str(&token_address)
                .context("Invalid token address in database")?,
            total_supply,
            holders: self.load_holders(chain_id, pool_id)?,
            metadata: SnapshotMetadata {
                chain_id,
                pool_id: pool_id.to_string(),
                transfers_processed,
                from_block,
                to_block,
                processing_time_ms,
                sync_mode: sync_mode.parse()?,
                stop_reason: stop_reason.parse()?,
            },
        }))
    }

    fn load_holders(&self, chain_id: u64, pool_id: &str) -> Result<Vec<Holder>> {
        let mut stmt = self.conn.prepare(Self::SELECT_HOLDERS)?;
        let rows = stmt
            .query_map(params![chain_id, pool_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, u32>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(address, padded, basis_points)| {
                Ok(Holder {
                    address: Address::from_str(&address)
                        .with_context(|| format!("Invalid holder address in database: {address}"))?,
                    balance: Self::unpad_balance(&padded)?,
                    percentage_of_supply: SupplyShare::from_basis_points(basis_points),
                })
            })
            .collect()
    }
}
