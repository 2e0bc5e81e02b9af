use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::FetchError;

// ---------------------------------------------------------------------------
// Token balances
// ---------------------------------------------------------------------------

/// One holding as reported by a chain data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "TokenBalanceWire")]
pub struct TokenBalance {
    pub symbol: String,
    pub name: String,
    #[serde(rename = "contractAddress")]
    pub contract_address: String,
    /// As reported by the source; not decimal-adjusted.
    #[serde(rename = "amount")]
    pub raw_amount: f64,
    pub value_usd: f64,
}

/// Balance API entries name the contract `address`; saved files use
/// `contractAddress`. Either or both may be present.
#[derive(Deserialize)]
struct TokenBalanceWire {
    #[serde(default, deserialize_with = "lenient_string")]
    symbol: String,
    #[serde(default, deserialize_with = "lenient_string")]
    name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    address: String,
    #[serde(default, rename = "contractAddress", deserialize_with = "lenient_string")]
    contract_address: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    amount: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    value_usd: f64,
}

impl From<TokenBalanceWire> for TokenBalance {
    fn from(w: TokenBalanceWire) -> Self {
        let contract_address = if w.address.is_empty() { w.contract_address } else { w.address };
        Self {
            symbol: w.symbol,
            name: w.name,
            contract_address,
            raw_amount: w.amount,
            value_usd: w.value_usd,
        }
    }
}

/// Accepts a number, a numeric string, or null (→ 0.0).
fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let v = serde_json::Value::deserialize(deserializer)?;
    Ok(match v {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        serde_json::Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    })
}

/// Accepts a string or null (→ "").
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Per-chain and merged wallet results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Ethereum,
    Hyperliquid,
}

impl std::fmt::Display for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Chain::Ethereum => "ethereum",
            Chain::Hyperliquid => "hyperliquid",
        };
        write!(f, "{s}")
    }
}

/// Valued holdings on one chain, before being tagged with an outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChainBalance {
    pub balance_usd: f64,
    /// Native token units (HYPE on Hyperliquid). 0 where not tracked.
    pub balance_native: f64,
    pub token_count: usize,
}

/// One (wallet, chain) fetch attempt. On failure every amount is 0 and
/// `error` carries the reason; check `success` before trusting a zero balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletChainResult {
    pub address: String,
    pub chain: Chain,
    pub balance_usd: f64,
    #[serde(default)]
    pub balance_native: f64,
    #[serde(default)]
    pub token_count: usize,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WalletChainResult {
    pub fn from_outcome(
        address: &str,
        chain: Chain,
        outcome: std::result::Result<ChainBalance, FetchError>,
    ) -> Self {
        match outcome {
            Ok(b) => Self {
                address: address.to_string(),
                chain,
                balance_usd: b.balance_usd,
                balance_native: b.balance_native,
                token_count: b.token_count,
                success: true,
                error: None,
            },
            Err(e) => Self::failed(address, chain, e.to_string()),
        }
    }

    pub fn failed(address: &str, chain: Chain, error: String) -> Self {
        Self {
            address: address.to_string(),
            chain,
            balance_usd: 0.0,
            balance_native: 0.0,
            token_count: 0,
            success: false,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletMergedResult {
    pub address: String,
    pub balance_usd: f64,
    #[serde(default)]
    pub eth_balance_usd: f64,
    #[serde(default)]
    pub hl_balance_usd: f64,
    #[serde(default)]
    pub hl_balance_hype: f64,
    #[serde(default)]
    pub token_count: usize,
    pub success: bool,
}

// ---------------------------------------------------------------------------
// Scan summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub total_value_usd: f64,
    #[serde(default)]
    pub total_eth_usd: f64,
    #[serde(default)]
    pub total_hl_usd: f64,
    /// Total divided by successful wallets only, so avg × scanned ≠ total in general.
    pub avg_value_usd: f64,
    #[serde(default)]
    pub hype_price: f64,
    pub wallet_balances: Vec<WalletMergedResult>,
    #[serde(default)]
    pub wallets_scanned: usize,
    #[serde(default)]
    pub wallets_successful: usize,
    #[serde(default)]
    pub timestamp: String,
}

impl ScanSummary {
    pub fn from_results(
        wallet_balances: Vec<WalletMergedResult>,
        wallets_scanned: usize,
        hype_price: f64,
    ) -> Self {
        let total_value_usd: f64 = wallet_balances.iter().map(|w| w.balance_usd).sum();
        let total_eth_usd: f64 = wallet_balances.iter().map(|w| w.eth_balance_usd).sum();
        let total_hl_usd: f64 = wallet_balances.iter().map(|w| w.hl_balance_usd).sum();
        let wallets_successful = wallet_balances.iter().filter(|w| w.success).count();
        let avg_value_usd = if wallets_successful > 0 {
            total_value_usd / wallets_successful as f64
        } else {
            0.0
        };

        Self {
            total_value_usd,
            total_eth_usd,
            total_hl_usd,
            avg_value_usd,
            hype_price,
            wallet_balances,
            wallets_scanned,
            wallets_successful,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

// ---------------------------------------------------------------------------
// Collections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "NFT")]
    Nft,
    #[serde(rename = "DeFi")]
    Defi,
    Other,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Category::Nft => "NFT",
            Category::Defi => "DeFi",
            Category::Other => "Other",
        };
        write!(f, "{s}")
    }
}

/// Raw per-entity claim data as collected from the collection API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionRecord {
    pub entity: String,
    pub unique_wallets: u64,
    #[serde(default)]
    pub total_activities: u64,
    #[serde(default = "empty_object")]
    pub stats: serde_json::Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<serde_json::Value>,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

impl CollectionRecord {
    pub fn new(entity: impl Into<String>, unique_wallets: u64, total_activities: u64) -> Self {
        Self {
            entity: entity.into(),
            unique_wallets,
            total_activities,
            stats: empty_object(),
            users: Vec::new(),
        }
    }
}

/// Ranked, categorized row. Rank and percentage are recomputed on every pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionRow {
    pub entity: String,
    pub unique_wallets: u64,
    pub total_activities: u64,
    pub stats: serde_json::Value,
    pub category: Category,
    pub rank: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSummary {
    pub total_collections: usize,
    pub total_claims: u64,
    pub total_unique_wallets: u64,
    pub top_collection: String,
    pub top_collection_wallets: u64,
    pub avg_wallets_per_collection: f64,
    pub median_wallets_per_collection: f64,
    pub wallets_by_category: BTreeMap<Category, u64>,
}

impl Default for CollectionSummary {
    fn default() -> Self {
        Self {
            total_collections: 0,
            total_claims: 0,
            total_unique_wallets: 0,
            top_collection: "N/A".to_string(),
            top_collection_wallets: 0,
            avg_wallets_per_collection: 0.0,
            median_wallets_per_collection: 0.0,
            wallets_by_category: BTreeMap::new(),
        }
    }
}

/// Persisted raw collection snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionData {
    pub collections: Vec<CollectionRecord>,
    pub total_unique_wallets: u64,
    pub timestamp: String,
}

impl CollectionData {
    /// Distinct wallet addresses across every collection's user list, in first-seen order.
    pub fn wallet_addresses(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.collections
            .iter()
            .flat_map(|c| c.users.iter())
            .filter_map(crate::fetcher::extract_wallet)
            .filter(|w| seen.insert(w.clone()))
            .collect()
    }
}

/// Aggregate counters from the collection API's overall stats endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveStats {
    #[serde(default)]
    pub unique_users: u64,
    #[serde(default)]
    pub total_records: u64,
    #[serde(default)]
    pub by_entity: BTreeMap<String, u64>,
    #[serde(default)]
    pub by_chain: BTreeMap<String, u64>,
}
