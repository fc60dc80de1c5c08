use crate::chains::chain_name;
use crate::registry::PoolInfo;
use crate::snapshot::Snapshot;
use alloy_primitives::U256;
use alloy_primitives::utils::format_units;
use comfy_table::{Cell, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use csv::Writer;

const DEFAULT_DECIMALS: u8 = 18;

#[derive(Debug, Clone)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "csv" => OutputFormat::Csv,
            _ => OutputFormat::Table,
        }
    }
}

fn format_amount(value: U256, decimals: u8) -> String {
    format_units(value, decimals).unwrap_or_else(|_| value.to_string())
}

fn csv_output(wtr: Writer<Vec<u8>>) -> String {
    String::from_utf8(wtr.into_inner().unwrap_or_default()).unwrap_or_default()
}

pub fn format_snapshot(snapshot: &Snapshot, decimals: Option<u8>, format: &OutputFormat) -> String {
    let decimals = decimals.unwrap_or(DEFAULT_DECIMALS);
    match format {
        OutputFormat::Table => format_snapshot_table(snapshot, decimals),
        OutputFormat::Json => {
            serde_json::to_string_pretty(snapshot).unwrap_or_else(|_| "{}".to_string())
        }
        OutputFormat::Csv => format_snapshot_csv(snapshot, decimals),
    }
}

fn format_snapshot_table(snapshot: &Snapshot, decimals: u8) -> String {
    let meta = &snapshot.metadata;

    let mut summary = Table::new();
    summary
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec!["Metric", "Value"]);
    summary.add_row(vec![Cell::new("Pool"), Cell::new(&meta.pool_id)]);
    summary.add_row(vec![
        Cell::new("Chain"),
        Cell::new(format!("{} ({})", chain_name(meta.chain_id), meta.chain_id)),
    ]);
    summary.add_row(vec![
        Cell::new("Token"),
        Cell::new(format!("{:#}", snapshot.token_address)),
    ]);
    summary.add_row(vec![
        Cell::new("Total Supply"),
        Cell::new(
            snapshot
                .total_supply
                .map_or("N/A".to_string(), |supply| format_amount(supply, decimals)),
        ),
    ]);
    summary.add_row(vec![
        Cell::new("Blocks"),
        Cell::new(format!("{} - {}", meta.from_block, meta.to_block)),
    ]);
    summary.add_row(vec![
        Cell::new("Transfers Processed"),
        Cell::new(meta.transfers_processed),
    ]);
    summary.add_row(vec![Cell::new("Sync Mode"), Cell::new(meta.sync_mode)]);
    summary.add_row(vec![Cell::new("Stop Reason"), Cell::new(meta.stop_reason)]);
    summary.add_row(vec![
        Cell::new("Updated At"),
        Cell::new(snapshot.updated_at.to_rfc3339()),
    ]);

    if snapshot.holders.is_empty() {
        return format!("{summary}\nNo holders found.");
    }

    let mut holders = Table::new();
    holders
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec!["Rank", "Address", "Balance", "Balance (Raw)", "Share (%)"]);

    for (i, holder) in snapshot.holders.iter().enumerate() {
        holders.add_row(vec![
            Cell::new(i + 1),
            Cell::new(format!("{:#}", holder.address)),
            Cell::new(format_amount(holder.balance, decimals)),
            Cell::new(holder.balance.to_string()),
            Cell::new(holder.percentage_of_supply),
        ]);
    }

    format!("{summary}\n{holders}")
}

fn format_snapshot_csv(snapshot: &Snapshot, decimals: u8) -> String {
    let mut wtr = Writer::from_writer(vec![]);

    let _ = wtr.write_record(["rank", "address", "balance", "balance_raw", "percentage_of_supply"]);

    for (i, holder) in snapshot.holders.iter().enumerate() {
        let _ = wtr.write_record([
            &(i + 1).to_string(),
            &format!("{:?}", holder.address),
            &format_amount(holder.balance, decimals),
            &holder.balance.to_string(),
            &holder.percentage_of_supply.to_string(),
        ]);
    }

    csv_output(wtr)
}

pub fn format_pools(pools: &[PoolInfo], format: &OutputFormat) -> String {
    match format {
        OutputFormat::Table => {
            if pools.is_empty() {
                return "No pools registered.".to_string();
            }

            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .apply_modifier(UTF8_ROUND_CORNERS)
                .set_header(vec!["Pool", "Chain", "Token", "Symbol", "Decimals"]);

            for pool in pools {
                table.add_row(vec![
                    Cell::new(&pool.pool_id),
                    Cell::new(format!("{} ({})", chain_name(pool.chain_id), pool.chain_id)),
                    Cell::new(
                        pool.token_address
                            .map_or("-".to_string(), |token| format!("{token:#}")),
                    ),
                    Cell::new(pool.symbol.as_deref().unwrap_or("-")),
                    Cell::new(pool.decimals.map_or("-".to_string(), |d| d.to_string())),
                ]);
            }

            table.to_string()
        }
        OutputFormat::Json => {
            serde_json::to_string_pretty(pools).unwrap_or_else(|_| "[]".to_string())
        }
        OutputFormat::Csv => {
            let mut wtr = Writer::from_writer(vec![]);
            let _ = wtr.write_record(["pool_id", "chain_id", "token_address", "symbol", "decimals"]);
            for pool in pools {
                let _ = wtr.write_record([
                    pool.pool_id.clone(),
                    pool.chain_id.to_string(),
                    pool.token_address
                        .map(|token| format!("{token:?}"))
                        .unwrap_or_default(),
                    pool.symbol.clone().unwrap_or_default(),
                    pool.decimals.map(|d| d.to_string()).unwrap_or_default(),
                ]);
            }
            csv_output(wtr)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{SnapshotMetadata, StopReason, SyncMode, rank_holders};
    use alloy_primitives::address;
    use chrono::Utc;

    fn snapshot() -> Snapshot {
        let balances = vec![
            (address!("0x000000000000000000000000000000000000000a"), U256::from(70)),
            (address!("0x000000000000000000000000000000000000000b"), U256::from(50)),
            (address!("0x000000000000000000000000000000000000000c"), U256::from(30)),
        ];
        Snapshot {
            updated_at: Utc::now(),
            token_address: address!("0x00000000000000000000000000000000000000ff"),
            total_supply: Some(U256::from(150)),
            holders: rank_holders(balances, Some(U256::from(150)), 20),
            metadata: SnapshotMetadata {
                chain_id: 1,
                pool_id: "pool-1".to_string(),
                transfers_processed: 4,
                from_block: 100,
                to_block: 200,
                processing_time_ms: 12,
                sync_mode: SyncMode::CreationBlock,
                stop_reason: StopReason::Exhausted,
            },
        }
    }

    #[test]
    fn test_output_format_parsing() {
        assert!(matches!(OutputFormat::from("JSON"), OutputFormat::Json));
        assert!(matches!(OutputFormat::from("csv"), OutputFormat::Csv));
        assert!(matches!(OutputFormat::from("anything"), OutputFormat::Table));
    }

    #[test]
    fn test_snapshot_csv_rows() {
        let csv = format_snapshot(&snapshot(), Some(0), &OutputFormat::Csv);
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "rank,address,balance,balance_raw,percentage_of_supply");
        assert!(lines[1].starts_with("1,0x000000000000000000000000000000000000000a,"));
        assert!(lines[1].ends_with(",70,46.67"));
        assert!(lines[3].ends_with(",30,20.00"));
    }

    #[test]
    fn test_snapshot_json_is_the_stored_document() {
        let snapshot = snapshot();
        let json = format_snapshot(&snapshot, None, &OutputFormat::Json);
        let parsed: Snapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, snapshot);
    }

    #[test]
    fn test_snapshot_table_includes_summary_and_holders() {
        let table = format_snapshot(&snapshot(), Some(0), &OutputFormat::Table);
        assert!(table.contains("pool-1"));
        assert!(table.contains("creation_block"));
        assert!(table.contains("46.67"));
    }

    #[test]
    fn test_pools_csv_handles_missing_fields() {
        let mut pool = PoolInfo::new(
            "pool-1",
            8_453,
            address!("0x00000000000000000000000000000000000000ff"),
        );
        pool.symbol = Some("USDC".to_string());
        let orphan = PoolInfo {
            token_address: None,
            ..PoolInfo::new("pool-2", 1, Default::default())
        };

        let csv = format_pools(&[pool, orphan], &OutputFormat::Csv);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("pool-1,8453,0x"));
        assert!(lines[1].contains(",USDC,"));
        assert_eq!(lines[2], "pool-2,1,,,");
    }
}
