use std::path::PathBuf;

use crate::error::{AppError, Result};

pub const COLLECTION_API_URL: &str = "https://www.fastprotocol.io";
pub const DUNE_API_URL: &str = "https://api.sim.dune.com/v1/evm/balances";
pub const ALCHEMY_HL_BASE_URL: &str = "https://hyperliquid-mainnet.g.alchemy.com/v2";
pub const COINGECKO_PRICE_URL: &str = "https://api.coingecko.com/api/v3/simple/price";

/// Price index asset id for HYPE.
pub const HYPE_PRICE_ASSET_ID: &str = "hyperliquid";

/// Canonical wrapped HYPE on HyperEVM. Redeemable 1:1 for native HYPE.
pub const WHYPE_CONTRACT: &str = "0x5555555555555555555555555555555555555555";

/// Ethereum mainnet chain id passed to the balance API.
pub const ETHEREUM_CHAIN_ID: &str = "1";

/// Per-request timeouts (seconds).
pub const COLLECTION_API_TIMEOUT_SECS: u64 = 30;
pub const ETH_BALANCE_TIMEOUT_SECS: u64 = 15;
pub const HL_RPC_TIMEOUT_SECS: u64 = 10;
pub const PRICE_TIMEOUT_SECS: u64 = 10;

/// Native price freshness window (seconds).
pub const PRICE_CACHE_TTL_SECS: u64 = 300;

/// Page size for the per-entity user listing.
pub const USERS_PAGE_SIZE: usize = 200;

/// How often the live collection stats are re-fetched (seconds).
pub const LIVE_STATS_REFRESH_SECS: u64 = 300;

/// Log scan progress every N completed wallets.
pub const SCAN_PROGRESS_EVERY: usize = 10;

/// Fixed-point decimals assumed for HyperEVM native and ERC20 quantities.
pub const HL_TOKEN_DECIMALS: u8 = 18;

/// Output file names, relative to `Config::output_dir`.
pub mod files {
    pub const COLLECTION_DATA_JSON: &str = "fast_protocol_data.json";
    pub const WALLET_BALANCES_JSON: &str = "wallet_balances.json";
    pub const COLLECTIONS_CSV: &str = "fast_protocol_collections.csv";
    pub const WALLET_LIST_CSV: &str = "fast_protocol_wallet_list.csv";
}

/// Spam heuristic thresholds.
pub mod spam_thresholds {
    /// Unrecognized tokens valued above this are treated as spam.
    pub const HIGH_VALUE_USD: f64 = 10_000.0;
}

#[derive(Debug, Clone)]
pub struct Config {
    pub collection_api_url: String,
    pub dune_api_url: String,
    /// Balance API key (DUNE_API_KEY). Ethereum fetches fail softly without it.
    pub dune_api_key: Option<String>,
    pub alchemy_hl_url: String,
    pub coingecko_price_url: String,
    /// Lowercased contract addresses valued at the HYPE price (HL_HYPE_TOKENS, comma-separated).
    pub hl_hype_tokens: Vec<String>,
    pub output_dir: PathBuf,
    pub log_level: String,
    pub api_port: u16,
    /// Cap on users fetched per entity during collection (MAX_USERS_PER_ENTITY, 0 = unlimited)
    pub max_users_per_entity: usize,
    /// Delay between user pages (RATE_LIMIT_DELAY_MS)
    pub rate_limit_delay_ms: u64,
    /// Balance fetch workers (SCAN_WORKERS)
    pub scan_workers: usize,
    /// Pending-queue bound as a multiple of the worker count (SCAN_QUEUE_FACTOR)
    pub scan_queue_factor: usize,
    pub skip_wallet_scan: bool,
    pub serve_api: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let alchemy_hl_url = get("ALCHEMY_HL_URL").unwrap_or_else(|| {
            let key = get("ALCHEMY_API_KEY").unwrap_or_else(|| "demo".to_string());
            format!("{ALCHEMY_HL_BASE_URL}/{key}")
        });

        let hl_hype_tokens: Vec<String> = get("HL_HYPE_TOKENS")
            .unwrap_or_else(|| WHYPE_CONTRACT.to_string())
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            collection_api_url: get("COLLECTION_API_URL")
                .unwrap_or_else(|| COLLECTION_API_URL.to_string()),
            dune_api_url: get("DUNE_API_URL").unwrap_or_else(|| DUNE_API_URL.to_string()),
            dune_api_key: get("DUNE_API_KEY").filter(|k| !k.trim().is_empty()),
            alchemy_hl_url,
            coingecko_price_url: get("COINGECKO_PRICE_URL")
                .unwrap_or_else(|| COINGECKO_PRICE_URL.to_string()),
            hl_hype_tokens,
            output_dir: PathBuf::from(get("OUTPUT_DIR").unwrap_or_else(|| "output".to_string())),
            log_level: get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            api_port: get("API_PORT")
                .unwrap_or_else(|| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            max_users_per_entity: get("MAX_USERS_PER_ENTITY")
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(1000),
            rate_limit_delay_ms: get("RATE_LIMIT_DELAY_MS")
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(500),
            scan_workers: get("SCAN_WORKERS")
                .and_then(|v| v.parse::<usize>().ok())
                .filter(|n| *n > 0)
                .unwrap_or(5),
            scan_queue_factor: get("SCAN_QUEUE_FACTOR")
                .and_then(|v| v.parse::<usize>().ok())
                .filter(|n| *n > 0)
                .unwrap_or(2),
            skip_wallet_scan: get("SKIP_WALLET_SCAN").map_or(false, |v| parse_flag(&v)),
            serve_api: get("SERVE_API").map_or(true, |v| parse_flag(&v)),
        })
    }

    /// Bound on wallets waiting for a free worker.
    pub fn scan_queue_capacity(&self) -> usize {
        self.scan_workers * self.scan_queue_factor
    }

    /// `None` means no per-entity cap.
    pub fn max_users(&self) -> Option<usize> {
        (self.max_users_per_entity > 0).then_some(self.max_users_per_entity)
    }
}

fn parse_flag(v: &str) -> bool {
    matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
