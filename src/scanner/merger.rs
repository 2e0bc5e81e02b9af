use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::chains::BalanceSource;
use crate::state::PriceCache;
use crate::types::{WalletChainResult, WalletMergedResult};

/// Produces one merged result per wallet. Never fails: chain errors surface
/// as `success = false` on the merged result.
#[async_trait]
pub trait WalletFetcher: Send + Sync {
    /// Current native token price, as used for the latest wallet.
    async fn native_price_usd(&self) -> f64;
    async fn fetch_wallet(&self, address: &str) -> WalletMergedResult;
}

/// Queries Ethereum and Hyperliquid concurrently and merges the two results.
pub struct MultiChainFetcher {
    price_cache: Arc<PriceCache>,
    ethereum: Arc<dyn BalanceSource>,
    hyperliquid: Arc<dyn BalanceSource>,
}

impl MultiChainFetcher {
    pub fn new(
        price_cache: Arc<PriceCache>,
        ethereum: Arc<dyn BalanceSource>,
        hyperliquid: Arc<dyn BalanceSource>,
    ) -> Self {
        Self { price_cache, ethereum, hyperliquid }
    }
}

#[async_trait]
impl WalletFetcher for MultiChainFetcher {
    async fn native_price_usd(&self) -> f64 {
        self.price_cache.native_price_usd().await
    }

    /// Price is read per wallet so a miss is retried on the next one.
    async fn fetch_wallet(&self, address: &str) -> WalletMergedResult {
        let native_price_usd = self.price_cache.native_price_usd().await;
        let (eth, hl) = tokio::join!(
            self.ethereum.fetch(address, native_price_usd),
            self.hyperliquid.fetch(address, native_price_usd),
        );
        for r in [&eth, &hl].into_iter().filter(|r| !r.success) {
            debug!(
                chain = %r.chain,
                "[FETCH] {address} failed on {}: {}",
                r.chain,
                r.error.as_deref().unwrap_or("unknown error"),
            );
        }
        merge_wallet_balances(address, &eth, &hl)
    }
}

/// Combine per-chain results. A failed chain contributes nothing; the wallet
/// counts as successful if either chain succeeded.
pub fn merge_wallet_balances(
    address: &str,
    eth: &WalletChainResult,
    hl: &WalletChainResult,
) -> WalletMergedResult {
    let eth_usd = if eth.success { eth.balance_usd.max(0.0) } else { 0.0 };
    let (hl_usd, hl_hype) = if hl.success {
        (hl.balance_usd.max(0.0), hl.balance_native.max(0.0))
    } else {
        (0.0, 0.0)
    };
    let token_count = [eth, hl]
        .iter()
        .filter(|r| r.success)
        .map(|r| r.token_count)
        .sum();

    WalletMergedResult {
        address: address.to_string(),
        balance_usd: eth_usd + hl_usd,
        eth_balance_usd: eth_usd,
        hl_balance_usd: hl_usd,
        hl_balance_hype: hl_hype,
        token_count,
        success: eth.success || hl.success,
    }
}
