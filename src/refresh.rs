use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use tracing::{error, info, warn};

use crate::api::health::HealthState;
use crate::config::{Config, LIVE_STATS_REFRESH_SECS};
use crate::error::{AppError, Result};
use crate::fetcher::CollectionClient;
use crate::scanner::WalletScanner;
use crate::scorer::{aggregate, rows_from_live_stats};
use crate::state::ReportStore;
use crate::store;
use crate::types::{CollectionData, ScanSummary};

fn now_secs() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

// ---------------------------------------------------------------------------
// LiveStatsRefresher
// ---------------------------------------------------------------------------

/// Swaps the collection table for the API's overall counters every five
/// minutes. A failed pass leaves the previous table in place.
pub struct LiveStatsRefresher {
    client: Arc<CollectionClient>,
    store: Arc<ReportStore>,
    health: Arc<HealthState>,
}

impl LiveStatsRefresher {
    pub fn new(client: Arc<CollectionClient>, store: Arc<ReportStore>, health: Arc<HealthState>) -> Self {
        Self { client, store, health }
    }

    pub async fn run(self) {
        let mut ticker = interval(Duration::from_secs(LIVE_STATS_REFRESH_SECS));
        ticker.tick().await; // skip immediate first tick, startup already collected

        loop {
            ticker.tick().await;
            if let Err(e) = self.refresh_once().await {
                self.health.inc_stats_refresh_failures();
                warn!("[LIVE] stats refresh failed, keeping previous table: {e}");
            }
        }
    }

    pub async fn refresh_once(&self) -> Result<()> {
        let stats = self.client.fetch_live_stats().await?;
        let rows = aggregate(rows_from_live_stats(&stats));
        let count = rows.len();
        self.store.replace_collections(rows, stats.unique_users);
        self.health.set_last_stats_refresh(now_secs());

        info!(
            collections = count,
            unique_users = stats.unique_users,
            total_records = stats.total_records,
            "[LIVE] collection table refreshed",
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// DeepRefresh
// ---------------------------------------------------------------------------

/// Releases the deep-refresh slot when the run ends, including on panic.
struct SlotGuard(Arc<HealthState>);

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.0.end_deep_refresh();
    }
}

/// Full pass: re-collect claimers, re-rank collections, scan every wallet on
/// both chains, persist, publish. At most one runs at a time.
pub struct DeepRefresh {
    output_dir: PathBuf,
    client: Arc<CollectionClient>,
    scanner: Arc<WalletScanner>,
    store: Arc<ReportStore>,
    health: Arc<HealthState>,
}

impl DeepRefresh {
    pub fn new(
        cfg: &Config,
        client: Arc<CollectionClient>,
        scanner: Arc<WalletScanner>,
        store: Arc<ReportStore>,
        health: Arc<HealthState>,
    ) -> Self {
        Self {
            output_dir: cfg.output_dir.clone(),
            client,
            scanner,
            store,
            health,
        }
    }

    /// Starts a background run. Returns false if one is already in progress.
    pub fn try_spawn(self: &Arc<Self>) -> bool {
        if !self.health.try_begin_deep_refresh() {
            return false;
        }
        let guard = SlotGuard(Arc::clone(&self.health));
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let _guard = guard;
            match this.refresh().await {
                Ok(summary) => info!(
                    wallets = summary.wallets_scanned,
                    total_usd = summary.total_value_usd,
                    "[REFRESH] deep refresh complete",
                ),
                Err(e) => error!("[REFRESH] deep refresh failed: {e}"),
            }
        });
        true
    }

    pub async fn refresh(&self) -> Result<ScanSummary> {
        info!("[REFRESH] deep refresh started");
        let data = self.client.collect_all_data().await?;

        // Nothing is overwritten unless the collection pass produced wallets.
        if data.collections.is_empty() {
            return Err(AppError::Bootstrap("collection API returned no entities".to_string()));
        }
        let addresses = data.wallet_addresses();
        if addresses.is_empty() {
            return Err(AppError::Bootstrap("no wallet addresses found".to_string()));
        }

        store::save_collection_data(&self.output_dir, &data)?;
        self.publish_collections(&data)?;
        self.scan_and_persist(&addresses).await
    }

    /// Rank, export and publish a collection snapshot.
    pub fn publish_collections(&self, data: &CollectionData) -> Result<()> {
        let rows = aggregate(data.collections.clone());
        store::export_collections(&self.output_dir, &rows)?;
        self.store.replace_collections(rows, data.total_unique_wallets);
        Ok(())
    }

    pub async fn scan_and_persist(&self, addresses: &[String]) -> Result<ScanSummary> {
        let summary = self.scanner.scan(addresses).await;
        store::save_scan_summary(&self.output_dir, &summary)?;
        store::export_wallet_list(&self.output_dir, &summary.wallet_balances)?;
        self.store.publish_scan(&summary);
        self.health.set_last_scan(now_secs());
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::files::{COLLECTIONS_CSV, WALLET_BALANCES_JSON, WALLET_LIST_CSV};
    use crate::scanner::WalletFetcher;
    use crate::types::{CollectionRecord, WalletMergedResult};
    use async_trait::async_trait;
    use axum::{http::StatusCode, routing::get, Json, Router};
    use serde_json::json;

    struct FlatFetcher;

    #[async_trait]
    impl WalletFetcher for FlatFetcher {
        async fn native_price_usd(&self) -> f64 {
            20.0
        }

        async fn fetch_wallet(&self, address: &str) -> WalletMergedResult {
            WalletMergedResult {
                address: address.to_string(),
                balance_usd: 5.0,
                eth_balance_usd: 5.0,
                hl_balance_usd: 0.0,
                hl_balance_hype: 0.0,
                token_count: 1,
                success: true,
            }
        }
    }

    fn offline_config(name: &str) -> Config {
        let mut cfg = Config::from_lookup(|_| None).unwrap();
        cfg.collection_api_url = "http://127.0.0.1:9".to_string();
        cfg.output_dir = std::env::temp_dir().join(format!("claim-scanner-refresh-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&cfg.output_dir);
        std::fs::create_dir_all(&cfg.output_dir).unwrap();
        cfg
    }

    fn deep_refresh(cfg: &Config, store: Arc<ReportStore>, health: Arc<HealthState>) -> DeepRefresh {
        let client = Arc::new(CollectionClient::new(cfg).unwrap());
        let scanner = Arc::new(WalletScanner::new(Arc::new(FlatFetcher), 5, 10));
        DeepRefresh::new(cfg, client, scanner, store, health)
    }

    #[tokio::test]
    async fn scan_is_persisted_and_published() {
        let cfg = offline_config("scan");
        let store = ReportStore::new();
        let health = Arc::new(HealthState::new());
        let refresh = deep_refresh(&cfg, Arc::clone(&store), Arc::clone(&health));

        let addresses: Vec<String> = vec!["0x1".into(), "0x2".into(), "0x1".into()];
        let summary = refresh.scan_and_persist(&addresses).await.unwrap();

        assert_eq!(summary.wallets_scanned, 2);
        assert_eq!(store.wallet_count(), 2);
        assert_eq!(store.scan_totals().unwrap().total_value_usd, 10.0);
        assert!(health.last_scan() > 0);
        assert!(cfg.output_dir.join(WALLET_BALANCES_JSON).exists());
        assert!(cfg.output_dir.join(WALLET_LIST_CSV).exists());
        std::fs::remove_dir_all(&cfg.output_dir).unwrap();
    }

    #[tokio::test]
    async fn collections_are_exported_and_published() {
        let cfg = offline_config("collections");
        let store = ReportStore::new();
        let refresh = deep_refresh(&cfg, Arc::clone(&store), Arc::new(HealthState::new()));

        let data = CollectionData {
            collections: vec![CollectionRecord::new("azuki", 3, 3), CollectionRecord::new("aave", 1, 1)],
            total_unique_wallets: 4,
            timestamp: String::new(),
        };
        refresh.publish_collections(&data).unwrap();

        assert_eq!(store.collection_count(), 2);
        assert_eq!(store.collection_summary().top_collection, "azuki");
        assert!(cfg.output_dir.join(COLLECTIONS_CSV).exists());
        std::fs::remove_dir_all(&cfg.output_dir).unwrap();
    }

    #[tokio::test]
    async fn failed_deep_refresh_releases_slot() {
        let cfg = offline_config("slot");
        let health = Arc::new(HealthState::new());
        let refresh = Arc::new(deep_refresh(&cfg, ReportStore::new(), Arc::clone(&health)));

        assert!(refresh.try_spawn());
        for _ in 0..100 {
            if !health.deep_refresh_running() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!health.deep_refresh_running());
        assert!(health.try_begin_deep_refresh());
        std::fs::remove_dir_all(&cfg.output_dir).unwrap();
    }

    /// Collection API whose entity list is an error object, or whose user
    /// pages all fail.
    async fn spawn_broken_api(entities_ok: bool) -> String {
        let entities = if entities_ok {
            json!({"entities": ["azuki"]})
        } else {
            json!({"error": "rate limited"})
        };
        let app = Router::new()
            .route(
                "/api/user-community-activity/entities",
                get(move || async move { Json(entities) }),
            )
            .route(
                "/api/user-community-activity/stats",
                get(|| async { Json(json!({})) }),
            )
            .route(
                "/api/user-community-activity/entity/:entity",
                get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn assert_empty_pass_keeps_previous_results(name: &str, entities_ok: bool) {
        let mut cfg = offline_config(name);
        cfg.collection_api_url = spawn_broken_api(entities_ok).await;
        cfg.rate_limit_delay_ms = 0;
        let store = ReportStore::new();
        let refresh = deep_refresh(&cfg, Arc::clone(&store), Arc::new(HealthState::new()));

        let previous = CollectionData {
            collections: vec![CollectionRecord::new("azuki", 3, 3)],
            total_unique_wallets: 3,
            timestamp: "earlier".to_string(),
        };
        store::save_collection_data(&cfg.output_dir, &previous).unwrap();
        refresh.publish_collections(&previous).unwrap();
        refresh.scan_and_persist(&["0x1".to_string()]).await.unwrap();

        assert!(refresh.refresh().await.is_err());

        let saved = store::load_scan_summary(&cfg.output_dir).unwrap().unwrap();
        assert_eq!(saved.wallets_scanned, 1);
        assert_eq!(saved.total_value_usd, 5.0);
        let data = store::load_collection_data(&cfg.output_dir).unwrap().unwrap();
        assert_eq!(data.timestamp, "earlier");
        assert_eq!(store.wallet_count(), 1);
        assert_eq!(store.collection_count(), 1);
        std::fs::remove_dir_all(&cfg.output_dir).unwrap();
    }

    #[tokio::test]
    async fn malformed_entity_list_keeps_previous_results() {
        assert_empty_pass_keeps_previous_results("entities", false).await;
    }

    #[tokio::test]
    async fn failing_user_pages_keep_previous_results() {
        assert_empty_pass_keeps_previous_results("users", true).await;
    }

    #[tokio::test]
    async fn failed_live_refresh_keeps_previous_table() {
        let cfg = offline_config("live");
        let store = ReportStore::new();
        store.replace_collections(aggregate(vec![CollectionRecord::new("azuki", 3, 3)]), 3);
        let health = Arc::new(HealthState::new());
        let refresher = LiveStatsRefresher::new(
            Arc::new(CollectionClient::new(&cfg).unwrap()),
            Arc::clone(&store),
            Arc::clone(&health),
        );

        assert!(refresher.refresh_once().await.is_err());
        assert_eq!(store.collections(None)[0].entity, "azuki");
        assert_eq!(health.last_stats_refresh(), 0);
        std::fs::remove_dir_all(&cfg.output_dir).unwrap();
    }
}
