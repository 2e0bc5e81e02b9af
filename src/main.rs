mod api;
mod chains;
mod config;
mod detector;
mod error;
mod fetcher;
mod refresh;
mod scanner;
mod scorer;
mod state;
mod store;
mod types;

use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::health::HealthState;
use crate::api::latency::FetchLatency;
use crate::api::routes::{router, ApiState};
use crate::chains::{EthereumSource, HyperliquidSource};
use crate::config::Config;
use crate::error::Result;
use crate::fetcher::CollectionClient;
use crate::refresh::{DeepRefresh, LiveStatsRefresher};
use crate::scanner::{MultiChainFetcher, WalletScanner};
use crate::state::{CoinGeckoSource, PriceCache, ReportStore, SystemClock};
use crate::types::CollectionData;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    store::ensure_dir(&cfg.output_dir)?;
    info!("Output directory: {}", cfg.output_dir.display());

    if cfg.dune_api_key.is_none() {
        warn!("DUNE_API_KEY not set: Ethereum balances will be reported as failed fetches");
    }

    // --- Shared state ---
    let report_store = ReportStore::new();
    let health = Arc::new(HealthState::new());
    let latency = Arc::new(FetchLatency::new()?);

    // --- Clients ---
    let collection_client = Arc::new(CollectionClient::new(&cfg)?);
    let price_cache = Arc::new(PriceCache::new(
        Arc::new(CoinGeckoSource::new(&cfg)?),
        Arc::new(SystemClock),
    ));
    let fetcher = MultiChainFetcher::new(
        price_cache,
        Arc::new(EthereumSource::new(&cfg)?),
        Arc::new(HyperliquidSource::new(&cfg)?),
    );
    let scanner = Arc::new(
        WalletScanner::from_config(Arc::new(fetcher), &cfg).with_latency(Arc::clone(&latency)),
    );
    let deep_refresh = Arc::new(DeepRefresh::new(
        &cfg,
        Arc::clone(&collection_client),
        scanner,
        Arc::clone(&report_store),
        Arc::clone(&health),
    ));

    // --- Collection bootstrap: live API, falling back to the last snapshot ---
    let data = bootstrap_collections(&cfg, &collection_client).await?;
    deep_refresh.publish_collections(&data)?;
    let summary = report_store.collection_summary();
    info!(
        collections = summary.total_collections,
        unique_wallets = summary.total_unique_wallets,
        "Bootstrap complete: {} collections, top: {} ({} wallets)",
        summary.total_collections,
        summary.top_collection,
        summary.top_collection_wallets,
    );

    // --- Wallet balances ---
    if let Some(previous) = store::load_scan_summary(&cfg.output_dir)? {
        info!(wallets = previous.wallet_balances.len(), "Loaded previous wallet scan from {}", previous.timestamp);
        report_store.publish_scan(&previous);
    }

    if cfg.skip_wallet_scan {
        info!("SKIP_WALLET_SCAN set, not scanning wallet balances");
    } else {
        let addresses = data.wallet_addresses();
        if addresses.is_empty() {
            warn!("No wallet addresses collected, skipping balance scan");
        } else {
            let scan = deep_refresh.scan_and_persist(&addresses).await?;
            info!(
                "Wallet scan complete: ${:.2} total (ETH ${:.2}, HL ${:.2}), avg ${:.2} over {} successful wallets",
                scan.total_value_usd,
                scan.total_eth_usd,
                scan.total_hl_usd,
                scan.avg_value_usd,
                scan.wallets_successful,
            );
        }
    }

    if !cfg.serve_api {
        return Ok(());
    }

    // --- Spawn tasks ---

    // Live stats refresher (background, every 300s)
    let refresher = LiveStatsRefresher::new(
        Arc::clone(&collection_client),
        Arc::clone(&report_store),
        Arc::clone(&health),
    );
    tokio::spawn(async move { refresher.run().await });

    // HTTP API server
    let api_state = ApiState {
        store: report_store,
        health,
        latency,
        deep_refresh,
    };
    let app = router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Collect from the API and persist the snapshot. If the API is unreachable or
/// returns nothing, reuse the last saved snapshot (or an empty one).
async fn bootstrap_collections(cfg: &Config, client: &CollectionClient) -> Result<CollectionData> {
    match client.collect_all_data().await {
        Ok(data) if !data.collections.is_empty() => {
            store::save_collection_data(&cfg.output_dir, &data)?;
            return Ok(data);
        }
        Ok(_) => warn!("[COLLECT] API returned no collections, trying saved snapshot"),
        Err(e) => warn!("[COLLECT] collection failed, trying saved snapshot: {e}"),
    }

    match store::load_collection_data(&cfg.output_dir)? {
        Some(data) => {
            info!(collections = data.collections.len(), "[COLLECT] using snapshot from {}", data.timestamp);
            Ok(data)
        }
        None => {
            warn!("[COLLECT] no saved snapshot, starting with an empty collection table");
            Ok(CollectionData {
                collections: Vec::new(),
                total_unique_wallets: 0,
                timestamp: chrono::Utc::now().to_rfc3339(),
            })
        }
    }
}
