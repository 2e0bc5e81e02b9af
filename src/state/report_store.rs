use std::sync::{Arc, RwLock};

use dashmap::DashMap;

use crate::scorer::summarize;
use crate::types::{Category, CollectionRow, CollectionSummary, ScanSummary, WalletMergedResult};

/// Scan totals without the per-wallet list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanTotals {
    pub total_value_usd: f64,
    pub total_eth_usd: f64,
    pub total_hl_usd: f64,
    pub avg_value_usd: f64,
    pub hype_price: f64,
    pub wallets_scanned: usize,
    pub wallets_successful: usize,
    pub timestamp: String,
}

impl From<&ScanSummary> for ScanTotals {
    fn from(s: &ScanSummary) -> Self {
        Self {
            total_value_usd: s.total_value_usd,
            total_eth_usd: s.total_eth_usd,
            total_hl_usd: s.total_hl_usd,
            avg_value_usd: s.avg_value_usd,
            hype_price: s.hype_price,
            wallets_scanned: s.wallets_scanned,
            wallets_successful: s.wallets_successful,
            timestamp: s.timestamp.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// ReportStore
// ---------------------------------------------------------------------------

/// Latest aggregated collections and wallet scan, shared between the
/// refreshers (writers) and the HTTP API (readers). Each publish replaces the
/// previous pass wholesale.
pub struct ReportStore {
    /// entity → ranked row from the latest aggregation pass
    collections: DashMap<String, CollectionRow>,
    /// address → merged balance from the latest scan
    wallets: DashMap<String, WalletMergedResult>,
    collection_summary: RwLock<CollectionSummary>,
    scan_totals: RwLock<Option<ScanTotals>>,
}

impl ReportStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn replace_collections(&self, rows: Vec<CollectionRow>, total_unique_wallets: u64) {
        let summary = summarize(&rows, total_unique_wallets);
        self.collections.clear();
        for row in rows {
            self.collections.insert(row.entity.clone(), row);
        }
        if let Ok(mut s) = self.collection_summary.write() {
            *s = summary;
        }
    }

    /// Rows in rank order, optionally restricted to one category.
    pub fn collections(&self, category: Option<Category>) -> Vec<CollectionRow> {
        let mut rows: Vec<CollectionRow> = self
            .collections
            .iter()
            .filter(|e| category.map_or(true, |c| e.value().category == c))
            .map(|e| e.value().clone())
            .collect();
        rows.sort_by_key(|r| r.rank);
        rows
    }

    pub fn collection_summary(&self) -> CollectionSummary {
        self.collection_summary
            .read()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    pub fn collection_count(&self) -> usize {
        self.collections.len()
    }

    pub fn publish_scan(&self, summary: &ScanSummary) {
        self.wallets.clear();
        for w in &summary.wallet_balances {
            self.wallets.insert(w.address.clone(), w.clone());
        }
        if let Ok(mut t) = self.scan_totals.write() {
            *t = Some(ScanTotals::from(summary));
        }
    }

    pub fn scan_totals(&self) -> Option<ScanTotals> {
        self.scan_totals.read().ok().and_then(|t| t.clone())
    }

    /// Wallets by USD balance, largest first.
    pub fn top_wallets(&self, limit: usize) -> Vec<WalletMergedResult> {
        let mut wallets: Vec<WalletMergedResult> =
            self.wallets.iter().map(|e| e.value().clone()).collect();
        wallets.sort_by(|a, b| b.balance_usd.total_cmp(&a.balance_usd));
        wallets.truncate(limit);
        wallets
    }

    pub fn wallet(&self, address: &str) -> Option<WalletMergedResult> {
        self.wallets.get(address).map(|w| w.clone())
    }

    pub fn wallet_count(&self) -> usize {
        self.wallets.len()
    }
}

impl Default for ReportStore {
    fn default() -> Self {
        Self {
            collections: DashMap::new(),
            wallets: DashMap::new(),
            collection_summary: RwLock::new(CollectionSummary::default()),
            scan_totals: RwLock::new(None),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
