pub mod ethereum;
pub mod hyperliquid;

use async_trait::async_trait;

use crate::types::WalletChainResult;

pub use ethereum::EthereumSource;
pub use hyperliquid::HyperliquidSource;

/// A per-chain balance lookup. Implementations never fail: every error is
/// folded into a `success = false` result carrying the error detail.
#[async_trait]
pub trait BalanceSource: Send + Sync {
    /// `native_price_usd` is the pre-fetched HYPE price; sources that price
    /// holdings themselves ignore it.
    async fn fetch(&self, address: &str, native_price_usd: f64) -> WalletChainResult;
}
