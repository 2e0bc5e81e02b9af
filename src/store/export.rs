use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::info;

use crate::config::files::{COLLECTIONS_CSV, WALLET_LIST_CSV};
use crate::error::Result;
use crate::types::{CollectionRow, WalletMergedResult};

const COLLECTION_COLUMNS: &[&str] = &[
    "entity",
    "unique_wallets",
    "total_activities",
    "category",
    "rank",
    "percentage",
];

const WALLET_COLUMNS: &[&str] = &["Address", "Balance USD", "Token Count"];

/// Ranked collection table. Each top-level stats key becomes a `stat_<key>`
/// column; rows lacking a key leave the cell empty.
pub fn write_collections<W: Write>(out: W, rows: &[CollectionRow]) -> Result<()> {
    let stat_keys: BTreeSet<&str> = rows
        .iter()
        .filter_map(|r| r.stats.as_object())
        .flat_map(|m| m.keys().map(String::as_str))
        .collect();

    let mut writer = csv::Writer::from_writer(out);

    let mut header: Vec<String> = COLLECTION_COLUMNS.iter().map(|c| c.to_string()).collect();
    header.extend(stat_keys.iter().map(|k| format!("stat_{k}")));
    writer.write_record(&header)?;

    for row in rows {
        let mut record = vec![
            row.entity.clone(),
            row.unique_wallets.to_string(),
            row.total_activities.to_string(),
            row.category.to_string(),
            row.rank.to_string(),
            format!("{:.2}", row.percentage),
        ];
        for key in &stat_keys {
            record.push(row.stats.get(*key).map(stat_cell).unwrap_or_default());
        }
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

fn stat_cell(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Address, USD balance (2 dp) and token count, largest balance first.
pub fn write_wallet_list<W: Write>(out: W, wallets: &[WalletMergedResult]) -> Result<()> {
    let mut sorted: Vec<&WalletMergedResult> = wallets.iter().collect();
    sorted.sort_by(|a, b| b.balance_usd.total_cmp(&a.balance_usd));

    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(WALLET_COLUMNS)?;
    for w in sorted {
        writer.write_record([
            w.address.clone(),
            format!("{:.2}", w.balance_usd),
            w.token_count.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn export_collections(dir: &Path, rows: &[CollectionRow]) -> Result<PathBuf> {
    let path = dir.join(COLLECTIONS_CSV);
    write_collections(std::fs::File::create(&path)?, rows)?;
    info!(rows = rows.len(), "[STORE] exported {}", path.display());
    Ok(path)
}

pub fn export_wallet_list(dir: &Path, wallets: &[WalletMergedResult]) -> Result<PathBuf> {
    let path = dir.join(WALLET_LIST_CSV);
    write_wallet_list(std::fs::File::create(&path)?, wallets)?;
    info!(wallets = wallets.len(), "[STORE] exported {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scorer::aggregate;
    use crate::types::CollectionRecord;
    use serde_json::json;

    fn wallet(address: &str, usd: f64, tokens: usize) -> WalletMergedResult {
        WalletMergedResult {
            address: address.to_string(),
            balance_usd: usd,
            eth_balance_usd: usd,
            hl_balance_usd: 0.0,
            hl_balance_hype: 0.0,
            token_count: tokens,
            success: true,
        }
    }

    fn render<F: FnOnce(&mut Vec<u8>) -> Result<()>>(f: F) -> Vec<String> {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap().lines().map(str::to_string).collect()
    }

    #[test]
    fn wallet_list_is_sorted_by_balance() {
        let wallets = vec![wallet("0xa", 1.0, 1), wallet("0xb", 250.456, 3), wallet("0xc", 20.0, 0)];
        let lines = render(|buf| write_wallet_list(buf, &wallets));

        assert_eq!(lines[0], "Address,Balance USD,Token Count");
        assert_eq!(lines[1], "0xb,250.46,3");
        assert_eq!(lines[2], "0xc,20.00,0");
        assert_eq!(lines[3], "0xa,1.00,1");
    }

    #[test]
    fn collection_stats_flatten_into_columns() {
        let mut azuki = CollectionRecord::new("azuki", 30, 40);
        azuki.stats = json!({"totalActivities": 40, "chain": "ethereum"});
        let mut aave = CollectionRecord::new("aave", 10, 12);
        aave.stats = json!({"volume": 1.5});
        let rows = aggregate(vec![aave, azuki]);

        let lines = render(|buf| write_collections(buf, &rows));

        assert_eq!(
            lines[0],
            "entity,unique_wallets,total_activities,category,rank,percentage,stat_chain,stat_totalActivities,stat_volume"
        );
        assert_eq!(lines[1], "azuki,30,40,NFT,1,75.00,ethereum,40,");
        assert_eq!(lines[2], "aave,10,12,DeFi,2,25.00,,,1.5");
    }

    #[test]
    fn empty_tables_still_have_headers() {
        assert_eq!(render(|buf| write_wallet_list(buf, &[])).len(), 1);
        assert_eq!(render(|buf| write_collections(buf, &[])).len(), 1);
    }
}
