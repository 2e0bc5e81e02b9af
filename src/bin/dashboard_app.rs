use serde::Deserialize;

// ---------------------------------------------------------------------------
// API response types (mirror routes.rs shapes)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[allow(dead_code)]
pub struct CollectionRow {
    pub entity: String,
    pub unique_wallets: u64,
    pub total_activities: u64,
    pub category: String,
    pub rank: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[allow(dead_code)]
pub struct CollectionSummary {
    pub total_collections: usize,
    pub total_claims: u64,
    pub total_unique_wallets: u64,
    pub top_collection: String,
    pub top_collection_wallets: u64,
    pub avg_wallets_per_collection: f64,
    pub median_wallets_per_collection: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletRow {
    pub address: String,
    pub balance_usd: f64,
    #[serde(default)]
    pub eth_balance_usd: f64,
    #[serde(default)]
    pub hl_balance_usd: f64,
    #[serde(default)]
    pub token_count: usize,
    pub success: bool,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[allow(dead_code)]
pub struct WalletSummary {
    pub total_value_usd: f64,
    pub total_eth_usd: f64,
    pub total_hl_usd: f64,
    pub avg_value_usd: f64,
    pub hype_price: f64,
    pub wallets_scanned: usize,
    pub wallets_successful: usize,
    pub timestamp: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[allow(dead_code)]
pub struct HealthResponse {
    pub collections: usize,
    pub wallets: usize,
    pub last_stats_refresh: u64,
    pub last_scan: u64,
    pub stats_refresh_failures: u64,
    pub deep_refresh_running: bool,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LatencyResponse {
    pub samples: u64,
    pub p50_ms: Option<u64>,
    pub p95_ms: Option<u64>,
    pub p99_ms: Option<u64>,
}

// ---------------------------------------------------------------------------
// App state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionStatus {
    Connected,
    Error(String),
    Connecting,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Focus {
    Collections,
    Wallets,
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub status: ConnectionStatus,
    pub collections: Vec<CollectionRow>,
    pub collection_summary: CollectionSummary,
    pub wallets: Vec<WalletRow>,
    /// None until the server has finished a scan.
    pub wallet_summary: Option<WalletSummary>,
    pub health: HealthResponse,
    pub latency: LatencyResponse,
    pub focus: Focus,
    /// One-line feedback from the last user action.
    pub flash: Option<String>,
    pub last_refresh: std::time::Instant,
    pub base_url: String,
}

impl AppState {
    pub fn new(base_url: String) -> Self {
        Self {
            status: ConnectionStatus::Connecting,
            collections: Vec::new(),
            collection_summary: CollectionSummary::default(),
            wallets: Vec::new(),
            wallet_summary: None,
            health: HealthResponse::default(),
            latency: LatencyResponse::default(),
            focus: Focus::Collections,
            flash: None,
            last_refresh: std::time::Instant::now(),
            base_url,
        }
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            Focus::Collections => Focus::Wallets,
            Focus::Wallets => Focus::Collections,
        };
    }

    /// Rows in the focused table.
    pub fn focused_len(&self) -> usize {
        match self.focus {
            Focus::Collections => self.collections.len(),
            Focus::Wallets => self.wallets.len(),
        }
    }

    pub async fn trigger_deep_refresh(&mut self, client: &reqwest::Client) {
        let url = format!("{}/refresh", self.base_url);
        self.flash = Some(match client.post(&url).send().await {
            Ok(resp) if resp.status() == reqwest::StatusCode::ACCEPTED => {
                "deep refresh started".to_string()
            }
            Ok(resp) if resp.status() == reqwest::StatusCode::CONFLICT => {
                "deep refresh already running".to_string()
            }
            Ok(resp) => format!("deep refresh rejected: {}", resp.status()),
            Err(e) => format!("deep refresh failed: {e}"),
        });
    }

    pub async fn refresh(&mut self, client: &reqwest::Client) {
        let collections_url = format!("{}/collections", self.base_url);
        let summary_url = format!("{}/collections/summary", self.base_url);
        let wallets_url = format!("{}/wallets?limit=200", self.base_url);
        let wallet_summary_url = format!("{}/wallets/summary", self.base_url);
        let health_url = format!("{}/health", self.base_url);
        let latency_url = format!("{}/stats/latency", self.base_url);

        let (collections_res, summary_res, wallets_res, wallet_summary_res, health_res, latency_res) = tokio::join!(
            client.get(&collections_url).send(),
            client.get(&summary_url).send(),
            client.get(&wallets_url).send(),
            client.get(&wallet_summary_url).send(),
            client.get(&health_url).send(),
            client.get(&latency_url).send(),
        );

        let (collections_resp, summary_resp, wallets_resp) = match (collections_res, summary_res, wallets_res) {
            (Ok(c), Ok(s), Ok(w)) => (c, s, w),
            (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => {
                self.status = ConnectionStatus::Error(format!("{e}"));
                return;
            }
        };

        let (collections, summary, wallets) = tokio::join!(
            collections_resp.json::<Vec<CollectionRow>>(),
            summary_resp.json::<CollectionSummary>(),
            wallets_resp.json::<Vec<WalletRow>>(),
        );

        match (collections, summary, wallets) {
            (Ok(c), Ok(s), Ok(w)) => {
                self.collections = c;
                self.collection_summary = s;
                self.wallets = w;
                self.status = ConnectionStatus::Connected;
                self.last_refresh = std::time::Instant::now();

                // 404 until the first scan completes
                self.wallet_summary = match wallet_summary_res {
                    Ok(r) if r.status().is_success() => r.json::<WalletSummary>().await.ok(),
                    _ => None,
                };
                if let Ok(h) = health_res {
                    if let Ok(health) = h.json::<HealthResponse>().await {
                        self.health = health;
                    }
                }
                if let Ok(l) = latency_res {
                    if let Ok(latency) = l.json::<LatencyResponse>().await {
                        self.latency = latency;
                    }
                }
            }
            (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => {
                self.status = ConnectionStatus::Error(format!("parse error: {e}"));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

/// `$1,234,567.89`
pub fn format_usd(v: f64) -> String {
    let cents = (v.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let sign = if v < 0.0 { "-" } else { "" };
    format!("{sign}${grouped}.{:02}", cents % 100)
}

pub fn format_ms(v: Option<u64>) -> String {
    match v {
        Some(ms) if ms >= 1000 => format!("{:.1}s", ms as f64 / 1000.0),
        Some(ms) => format!("{ms}ms"),
        None => "—".to_string(),
    }
}

/// `0x1234…abcd` for long addresses.
pub fn short_address(addr: &str) -> String {
    let chars: Vec<char> = addr.chars().collect();
    if chars.len() <= 13 {
        return addr.to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}…{tail}")
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{kept}…")
    }
}
