use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use crate::config::files::{COLLECTION_DATA_JSON, WALLET_BALANCES_JSON};
use crate::error::Result;
use crate::types::{CollectionData, ScanSummary};

pub fn ensure_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    Ok(())
}

pub fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

/// `Ok(None)` when the file does not exist; a malformed file is an error.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_reader(BufReader::new(file))?))
}

pub fn save_collection_data(dir: &Path, data: &CollectionData) -> Result<()> {
    let path = dir.join(COLLECTION_DATA_JSON);
    save_json(&path, data)?;
    info!(collections = data.collections.len(), "[STORE] saved {}", path.display());
    Ok(())
}

pub fn load_collection_data(dir: &Path) -> Result<Option<CollectionData>> {
    load_json(&dir.join(COLLECTION_DATA_JSON))
}

pub fn save_scan_summary(dir: &Path, summary: &ScanSummary) -> Result<()> {
    let path = dir.join(WALLET_BALANCES_JSON);
    save_json(&path, summary)?;
    info!(wallets = summary.wallet_balances.len(), "[STORE] saved {}", path.display());
    Ok(())
}

pub fn load_scan_summary(dir: &Path) -> Result<Option<ScanSummary>> {
    load_json(&dir.join(WALLET_BALANCES_JSON))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CollectionRecord, WalletMergedResult};
    use std::path::PathBuf;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("claim-scanner-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    fn wallet(address: &str, usd: f64) -> WalletMergedResult {
        WalletMergedResult {
            address: address.to_string(),
            balance_usd: usd,
            eth_balance_usd: usd,
            hl_balance_usd: 0.0,
            hl_balance_hype: 0.0,
            token_count: 2,
            success: true,
        }
    }

    #[test]
    fn scan_summary_survives_disk() {
        let dir = scratch_dir("scan");
        let summary = ScanSummary::from_results(vec![wallet("0x1", 12.5), wallet("0x2", 7.5)], 2, 30.0);

        save_scan_summary(&dir, &summary).unwrap();
        let loaded = load_scan_summary(&dir).unwrap().unwrap();

        assert_eq!(loaded.total_value_usd, 20.0);
        assert_eq!(loaded.wallet_balances.len(), 2);
        assert_eq!(loaded, summary);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn collection_data_keeps_users() {
        let dir = scratch_dir("collections");
        let mut record = CollectionRecord::new("azuki", 1, 1);
        record.users = vec![serde_json::json!({"wallet": "0xabc"})];
        let data = CollectionData {
            collections: vec![record],
            total_unique_wallets: 1,
            timestamp: "2026-01-01T00:00:00Z".to_string(),
        };

        save_collection_data(&dir, &data).unwrap();
        let loaded = load_collection_data(&dir).unwrap().unwrap();
        assert_eq!(loaded.wallet_addresses(), vec!["0xabc".to_string()]);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_file_is_none() {
        let dir = scratch_dir("missing");
        assert!(load_scan_summary(&dir).unwrap().is_none());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = scratch_dir("malformed");
        ensure_dir(&dir).unwrap();
        std::fs::write(dir.join(WALLET_BALANCES_JSON), "{not json").unwrap();
        assert!(load_scan_summary(&dir).is_err());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
