use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::chains::BalanceSource;
use crate::config::{Config, ETHEREUM_CHAIN_ID, ETH_BALANCE_TIMEOUT_SECS};
use crate::detector::partition_spam;
use crate::error::{FetchError, Result};
use crate::types::{Chain, ChainBalance, TokenBalance, WalletChainResult};

#[derive(Debug, Deserialize)]
struct BalancesResponse {
    #[serde(default)]
    balances: Vec<TokenBalance>,
}

/// Ethereum mainnet holdings from the account-balances API.
pub struct EthereumSource {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
}

impl EthereumSource {
    pub fn new(cfg: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(ETH_BALANCE_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            api_url: cfg.dune_api_url.trim_end_matches('/').to_string(),
            api_key: cfg.dune_api_key.clone(),
        })
    }

    /// Server-side spam exclusion is requested, but the local classifier is
    /// re-applied to whatever comes back.
    async fn fetch_balances(&self, address: &str) -> std::result::Result<Vec<TokenBalance>, FetchError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(FetchError::MissingConfig("DUNE_API_KEY"))?;

        let url = format!("{}/{}", self.api_url, address);
        let resp = self
            .client
            .get(&url)
            .header("X-Sim-Api-Key", api_key)
            .query(&[("chain_ids", ETHEREUM_CHAIN_ID), ("exclude_spam_tokens", "true")])
            .send()
            .await?;

        if resp.status() != reqwest::StatusCode::OK {
            return Err(FetchError::Status(resp.status()));
        }

        let body: BalancesResponse = resp.json().await?;
        Ok(body.balances)
    }
}

#[async_trait]
impl BalanceSource for EthereumSource {
    async fn fetch(&self, address: &str, _native_price_usd: f64) -> WalletChainResult {
        let outcome = self.fetch_balances(address).await.map(|balances| {
            let (holdings, spam) = value_holdings(balances);
            if !spam.is_empty() {
                let symbols: Vec<&str> = spam.iter().map(|t| t.symbol.as_str()).collect();
                debug!(address, discarded = spam.len(), "[ETH] dropped spam holdings: {symbols:?}");
            }
            holdings
        });

        if let Err(e) = &outcome {
            warn!(address, "[ETH] balance fetch failed: {e}");
        }

        WalletChainResult::from_outcome(address, Chain::Ethereum, outcome)
    }
}

/// Sum USD value over non-spam holdings. Returns the valuation and the
/// discarded spam entries.
pub fn value_holdings(balances: Vec<TokenBalance>) -> (ChainBalance, Vec<TokenBalance>) {
    let (legit, spam) = partition_spam(balances);
    let balance_usd = legit.iter().map(|b| b.value_usd.max(0.0)).sum();
    let holdings = ChainBalance {
        balance_usd,
        balance_native: 0.0,
        token_count: legit.len(),
    };
    (holdings, spam)
}
