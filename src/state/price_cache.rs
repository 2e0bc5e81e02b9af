#[cfg(test)]
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{Config, HYPE_PRICE_ASSET_ID, PRICE_CACHE_TTL_SECS, PRICE_TIMEOUT_SECS};
use crate::error::{FetchError, Result};

// ---------------------------------------------------------------------------
// Time source
// ---------------------------------------------------------------------------

pub trait Clock: Send + Sync {
    fn now_secs(&self) -> u64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}

/// Settable clock for tests.
#[cfg(test)]
#[derive(Default)]
pub struct ManualClock {
    now: AtomicU64,
}

#[cfg(test)]
impl ManualClock {
    pub fn new(start_secs: u64) -> Self {
        Self { now: AtomicU64::new(start_secs) }
    }

    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::Relaxed);
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now_secs(&self) -> u64 {
        self.now.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Price source
// ---------------------------------------------------------------------------

#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch_price_usd(&self) -> std::result::Result<f64, FetchError>;
}

/// Simple-price lookup for one asset id, quoted in USD.
pub struct CoinGeckoSource {
    client: reqwest::Client,
    url: String,
    asset_id: String,
}

impl CoinGeckoSource {
    pub fn new(cfg: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(PRICE_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            url: cfg.coingecko_price_url.clone(),
            asset_id: HYPE_PRICE_ASSET_ID.to_string(),
        })
    }
}

#[async_trait]
impl PriceSource for CoinGeckoSource {
    async fn fetch_price_usd(&self) -> std::result::Result<f64, FetchError> {
        let resp: serde_json::Value = self
            .client
            .get(&self.url)
            .query(&[("ids", self.asset_id.as_str()), ("vs_currencies", "usd")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(parse_simple_price(&resp, &self.asset_id))
    }
}

/// `{"<asset>": {"usd": 12.3}}` → 12.3; anything missing → 0.0.
pub fn parse_simple_price(body: &serde_json::Value, asset_id: &str) -> f64 {
    body.get(asset_id)
        .and_then(|a| a.get("usd"))
        .and_then(|p| p.as_f64())
        .unwrap_or(0.0)
}

// ---------------------------------------------------------------------------
// PriceCache
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceCacheEntry {
    pub price: f64,
    pub fetched_at: u64,
}

/// Single-slot native price cache with a freshness window.
///
/// A fresh non-zero entry is served without a request. Otherwise the source is
/// asked; a positive price replaces the entry, and any failure falls back to the
/// last known price (however stale) or 0.0. Concurrent refreshes are not
/// coalesced: whichever finishes last wins the slot.
pub struct PriceCache {
    source: Arc<dyn PriceSource>,
    clock: Arc<dyn Clock>,
    ttl_secs: u64,
    slot: Mutex<Option<PriceCacheEntry>>,
}

impl PriceCache {
    pub fn new(source: Arc<dyn PriceSource>, clock: Arc<dyn Clock>) -> Self {
        Self::with_ttl(source, clock, PRICE_CACHE_TTL_SECS)
    }

    pub fn with_ttl(source: Arc<dyn PriceSource>, clock: Arc<dyn Clock>, ttl_secs: u64) -> Self {
        Self {
            source,
            clock,
            ttl_secs,
            slot: Mutex::new(None),
        }
    }

    pub fn cached(&self) -> Option<PriceCacheEntry> {
        self.slot.lock().ok().and_then(|s| *s)
    }

    pub async fn native_price_usd(&self) -> f64 {
        let now = self.clock.now_secs();
        let previous = self.cached();

        if let Some(entry) = previous {
            if entry.price > 0.0 && now.saturating_sub(entry.fetched_at) < self.ttl_secs {
                return entry.price;
            }
        }

        let fallback = previous.map_or(0.0, |e| e.price);
        match self.source.fetch_price_usd().await {
            Ok(price) if price > 0.0 => {
                if let Ok(mut slot) = self.slot.lock() {
                    *slot = Some(PriceCacheEntry { price, fetched_at: now });
                }
                info!(price, "[PRICE] native price refreshed: ${price:.4}");
                price
            }
            Ok(_) => {
                warn!(fallback, "[PRICE] price index returned no price, using last known");
                fallback
            }
            Err(e) => {
                warn!(fallback, "[PRICE] price fetch failed, using last known: {e}");
                fallback
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// Replays a fixed sequence of responses and counts requests.
    struct ScriptedSource {
        responses: Mutex<Vec<std::result::Result<f64, ()>>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(mut responses: Vec<std::result::Result<f64, ()>>) -> Arc<Self> {
            responses.reverse();
            Arc::new(Self {
                responses: Mutex::new(responses),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PriceSource for ScriptedSource {
        async fn fetch_price_usd(&self) -> std::result::Result<f64, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.responses.lock().unwrap().pop() {
                Some(Ok(p)) => Ok(p),
                _ => Err(FetchError::Decode("scripted failure".to_string())),
            }
        }
    }

    fn cache(source: Arc<ScriptedSource>, clock: Arc<ManualClock>) -> PriceCache {
        PriceCache::new(source, clock)
    }

    #[tokio::test]
    async fn fresh_entry_is_served_without_refetch() {
        let source = ScriptedSource::new(vec![Ok(25.0), Ok(30.0)]);
        let clock = Arc::new(ManualClock::new(1_000));
        let cache = cache(Arc::clone(&source), Arc::clone(&clock));

        assert_eq!(cache.native_price_usd().await, 25.0);
        clock.advance(299);
        assert_eq!(cache.native_price_usd().await, 25.0);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn expired_entry_triggers_refresh() {
        let source = ScriptedSource::new(vec![Ok(25.0), Ok(30.0)]);
        let clock = Arc::new(ManualClock::new(1_000));
        let cache = cache(Arc::clone(&source), Arc::clone(&clock));

        cache.native_price_usd().await;
        clock.advance(300);
        assert_eq!(cache.native_price_usd().await, 30.0);
        assert_eq!(source.calls(), 2);
        assert_eq!(cache.cached().unwrap().fetched_at, 1_300);
    }

    #[tokio::test]
    async fn failed_refresh_returns_stale_price() {
        let source = ScriptedSource::new(vec![Ok(25.0), Err(())]);
        let clock = Arc::new(ManualClock::new(0));
        let cache = cache(Arc::clone(&source), Arc::clone(&clock));

        cache.native_price_usd().await;
        clock.advance(10_000);
        assert_eq!(cache.native_price_usd().await, 25.0);
        // stale entry is kept as-is
        assert_eq!(cache.cached().unwrap().fetched_at, 0);
    }

    #[tokio::test]
    async fn zero_price_does_not_overwrite_cache() {
        let source = ScriptedSource::new(vec![Ok(25.0), Ok(0.0)]);
        let clock = Arc::new(ManualClock::new(0));
        let cache = cache(Arc::clone(&source), Arc::clone(&clock));

        cache.native_price_usd().await;
        clock.advance(301);
        assert_eq!(cache.native_price_usd().await, 25.0);
        assert_eq!(cache.cached().unwrap().price, 25.0);
    }

    #[tokio::test]
    async fn never_populated_cache_returns_zero() {
        let source = ScriptedSource::new(vec![Err(())]);
        let cache = cache(Arc::clone(&source), Arc::new(ManualClock::new(0)));
        assert_eq!(cache.native_price_usd().await, 0.0);
        assert!(cache.cached().is_none());
    }

    #[test]
    fn simple_price_body_parses() {
        let body = serde_json::json!({"hyperliquid": {"usd": 41.27}});
        assert_eq!(parse_simple_price(&body, "hyperliquid"), 41.27);
        assert_eq!(parse_simple_price(&serde_json::json!({}), "hyperliquid"), 0.0);
    }
}
