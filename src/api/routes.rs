use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::health::HealthState;
use crate::api::latency::{FetchLatency, LatencySnapshot};
use crate::error::AppError;
use crate::refresh::DeepRefresh;
use crate::state::report_store::ScanTotals;
use crate::state::ReportStore;
use crate::types::{Category, CollectionRow, CollectionSummary, WalletMergedResult};

const DEFAULT_WALLET_LIMIT: usize = 100;

#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<ReportStore>,
    pub health: Arc<HealthState>,
    pub latency: Arc<FetchLatency>,
    pub deep_refresh: Arc<DeepRefresh>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/collections", get(get_collections))
        .route("/collections/summary", get(get_collection_summary))
        .route("/wallets", get(get_wallets))
        .route("/wallets/summary", get(get_wallet_summary))
        .route("/wallets/:address", get(get_wallet))
        .route("/refresh", post(post_refresh))
        .route("/health", get(get_health))
        .route("/stats/latency", get(get_stats_latency))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Query param structs
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct CollectionsQuery {
    pub category: Option<String>,
}

#[derive(Deserialize)]
pub struct WalletsQuery {
    pub limit: Option<usize>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize)]
pub struct WalletSummaryResponse {
    pub total_value_usd: f64,
    pub total_eth_usd: f64,
    pub total_hl_usd: f64,
    pub avg_value_usd: f64,
    pub hype_price: f64,
    pub wallets_scanned: usize,
    pub wallets_successful: usize,
    pub timestamp: String,
}

impl From<ScanTotals> for WalletSummaryResponse {
    fn from(t: ScanTotals) -> Self {
        Self {
            total_value_usd: t.total_value_usd,
            total_eth_usd: t.total_eth_usd,
            total_hl_usd: t.total_hl_usd,
            avg_value_usd: t.avg_value_usd,
            hype_price: t.hype_price,
            wallets_scanned: t.wallets_scanned,
            wallets_successful: t.wallets_successful,
            timestamp: t.timestamp,
        }
    }
}

#[derive(Serialize, Deserialize)]
pub struct RefreshResponse {
    pub status: String,
}

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub collections: usize,
    pub wallets: usize,
    pub last_stats_refresh: u64,
    pub last_scan: u64,
    pub stats_refresh_failures: u64,
    pub deep_refresh_running: bool,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

fn parse_category(raw: &str) -> Option<Category> {
    match raw.to_lowercase().as_str() {
        "nft" => Some(Category::Nft),
        "defi" => Some(Category::Defi),
        "other" => Some(Category::Other),
        _ => None,
    }
}

async fn get_collections(
    State(state): State<ApiState>,
    Query(params): Query<CollectionsQuery>,
) -> Result<Json<Vec<CollectionRow>>, AppError> {
    let category = match params.category.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(
            parse_category(raw)
                .ok_or_else(|| AppError::BadRequest(format!("unknown category {raw:?}")))?,
        ),
    };
    Ok(Json(state.store.collections(category)))
}

async fn get_collection_summary(State(state): State<ApiState>) -> Json<CollectionSummary> {
    Json(state.store.collection_summary())
}

async fn get_wallets(
    State(state): State<ApiState>,
    Query(params): Query<WalletsQuery>,
) -> Json<Vec<WalletMergedResult>> {
    let limit = params.limit.unwrap_or(DEFAULT_WALLET_LIMIT);
    Json(state.store.top_wallets(limit))
}

async fn get_wallet(
    State(state): State<ApiState>,
    Path(address): Path<String>,
) -> Result<Json<WalletMergedResult>, AppError> {
    state
        .store
        .wallet(&address)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("wallet {address} not in last scan")))
}

async fn get_wallet_summary(
    State(state): State<ApiState>,
) -> Result<Json<WalletSummaryResponse>, AppError> {
    state
        .store
        .scan_totals()
        .map(|t| Json(t.into()))
        .ok_or_else(|| AppError::NotFound("no wallet scan has completed yet".to_string()))
}

async fn post_refresh(
    State(state): State<ApiState>,
) -> Result<(StatusCode, Json<RefreshResponse>), AppError> {
    if !state.deep_refresh.try_spawn() {
        return Err(AppError::Conflict("deep refresh already running".to_string()));
    }
    Ok((
        StatusCode::ACCEPTED,
        Json(RefreshResponse { status: "started".to_string() }),
    ))
}

async fn get_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        collections: state.store.collection_count(),
        wallets: state.store.wallet_count(),
        last_stats_refresh: state.health.last_stats_refresh(),
        last_scan: state.health.last_scan(),
        stats_refresh_failures: state.health.stats_refresh_failures(),
        deep_refresh_running: state.health.deep_refresh_running(),
    })
}

async fn get_stats_latency(State(state): State<ApiState>) -> Json<LatencySnapshot> {
    Json(state.latency.snapshot())
}
