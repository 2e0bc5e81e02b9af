use std::collections::HashSet;
use std::time::Duration;

use alloy_primitives::{utils::format_units, U256};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::chains::BalanceSource;
use crate::config::{Config, HL_RPC_TIMEOUT_SECS, HL_TOKEN_DECIMALS};
use crate::error::{FetchError, Result};
use crate::types::{Chain, ChainBalance, WalletChainResult};

// ---------------------------------------------------------------------------
// JSON-RPC wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    id: u64,
    jsonrpc: &'static str,
    method: &'a str,
    params: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenBalancesResult {
    #[serde(default)]
    token_balances: Vec<RawTokenBalance>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTokenBalance {
    #[serde(default)]
    pub contract_address: String,
    /// Hex quantity; null when the node could not read the contract.
    #[serde(default)]
    pub token_balance: Option<String>,
}

// ---------------------------------------------------------------------------
// HyperliquidSource
// ---------------------------------------------------------------------------

/// HyperEVM holdings via an Alchemy-style JSON-RPC endpoint: native HYPE plus
/// ERC20 balances. Only contracts in `pegged_tokens` are valued (at the HYPE
/// price); every other non-zero token is counted but contributes no USD.
pub struct HyperliquidSource {
    client: reqwest::Client,
    rpc_url: String,
    pegged_tokens: HashSet<String>,
}

impl HyperliquidSource {
    pub fn new(cfg: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HL_RPC_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            rpc_url: cfg.alchemy_hl_url.clone(),
            pegged_tokens: cfg.hl_hype_tokens.iter().map(|t| t.to_lowercase()).collect(),
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        id: u64,
        method: &str,
        params: serde_json::Value,
    ) -> std::result::Result<Option<T>, FetchError> {
        let request = RpcRequest { id, jsonrpc: "2.0", method, params };
        let resp = self
            .client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        let body: RpcResponse<T> = resp.json().await?;
        if let Some(err) = body.error {
            return Err(FetchError::Rpc { code: err.code, message: err.message });
        }
        Ok(body.result)
    }

    /// Both calls must succeed; a failure in either discards the whole wallet.
    async fn fetch_holdings(
        &self,
        address: &str,
        hype_price: f64,
    ) -> std::result::Result<ChainBalance, FetchError> {
        if hype_price.is_nan() || hype_price <= 0.0 {
            return Err(FetchError::MissingPrice);
        }

        let native_hex: String = self
            .call(1, "eth_getBalance", serde_json::json!([address, "latest"]))
            .await?
            .unwrap_or_else(|| "0x0".to_string());

        let tokens: TokenBalancesResult = self
            .call(2, "alchemy_getTokenBalances", serde_json::json!([address, "erc20"]))
            .await?
            .unwrap_or_default();

        value_holdings(&native_hex, &tokens.token_balances, hype_price, &self.pegged_tokens)
    }
}

#[async_trait]
impl BalanceSource for HyperliquidSource {
    async fn fetch(&self, address: &str, native_price_usd: f64) -> WalletChainResult {
        let outcome = self.fetch_holdings(address, native_price_usd).await;
        if let Err(e) = &outcome {
            warn!(address, "[HL] balance fetch failed: {e}");
        }
        WalletChainResult::from_outcome(address, Chain::Hyperliquid, outcome)
    }
}

/// Value native HYPE plus pegged ERC20 holdings. All quantities are assumed to
/// carry `HL_TOKEN_DECIMALS`; tokens with other decimals are misvalued.
pub fn value_holdings(
    native_hex: &str,
    tokens: &[RawTokenBalance],
    hype_price: f64,
    pegged_tokens: &HashSet<String>,
) -> std::result::Result<ChainBalance, FetchError> {
    let mut holdings = ChainBalance::default();

    let native = hex_to_units(native_hex, HL_TOKEN_DECIMALS)?;
    holdings.balance_native = native;
    if native > 0.0 {
        holdings.balance_usd += native * hype_price;
        holdings.token_count += 1;
    }

    for tb in tokens {
        let raw = match tb.token_balance.as_deref() {
            None | Some("0x") | Some("0x0") => continue,
            Some(raw) => raw,
        };
        let balance = hex_to_units(raw, HL_TOKEN_DECIMALS)?;
        if balance <= 0.0 {
            continue;
        }
        holdings.token_count += 1;
        if pegged_tokens.contains(&tb.contract_address.to_lowercase()) {
            holdings.balance_usd += balance * hype_price;
        }
    }

    Ok(holdings)
}

/// Decode a `0x`-prefixed 256-bit hex quantity into token units.
pub fn hex_to_units(hex: &str, decimals: u8) -> std::result::Result<f64, FetchError> {
    let invalid = || FetchError::Decode(format!("invalid hex quantity {hex:?}"));

    let digits = hex
        .strip_prefix("0x")
        .or_else(|| hex.strip_prefix("0X"))
        .filter(|d| !d.is_empty())
        .ok_or_else(invalid)?;
    let raw = U256::from_str_radix(digits, 16).map_err(|_| invalid())?;

    format_units(raw, decimals)
        .map_err(|e| FetchError::Decode(format!("{hex:?}: {e}")))?
        .parse::<f64>()
        .map_err(|_| invalid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};

    const WHYPE: &str = "0x5555555555555555555555555555555555555555";

    fn pegged() -> HashSet<String> {
        [WHYPE.to_string()].into_iter().collect()
    }

    fn tb(contract: &str, balance: Option<&str>) -> RawTokenBalance {
        RawTokenBalance {
            contract_address: contract.to_string(),
            token_balance: balance.map(str::to_string),
        }
    }

    #[test]
    fn hex_units_decode_at_18_decimals() {
        // 1.5e18
        assert_eq!(hex_to_units("0x14d1120d7b160000", 18).unwrap(), 1.5);
        assert_eq!(hex_to_units("0x0", 18).unwrap(), 0.0);
    }

    #[test]
    fn full_width_quantity_decodes() {
        let max = format!("0x{}", "f".repeat(64));
        assert!(hex_to_units(&max, 18).unwrap() > 1e58);
    }

    #[test]
    fn invalid_hex_is_a_decode_error() {
        assert!(matches!(hex_to_units("0xzz", 18), Err(FetchError::Decode(_))));
        assert!(matches!(hex_to_units("1234", 18), Err(FetchError::Decode(_))));
        assert!(matches!(hex_to_units(&format!("0x{}", "f".repeat(65)), 18), Err(FetchError::Decode(_))));
    }

    #[test]
    fn empty_quantity_is_a_decode_error() {
        assert!(matches!(hex_to_units("", 18), Err(FetchError::Decode(_))));
        assert!(matches!(hex_to_units("0x", 18), Err(FetchError::Decode(_))));
        // empty native balance fails the wallet instead of reading as zero
        assert!(value_holdings("", &[], 25.0, &pegged()).is_err());
    }

    #[test]
    fn native_and_pegged_tokens_are_valued_at_hype_price() {
        let tokens = vec![
            tb(WHYPE, Some("0xde0b6b3a7640000")), // 1.0
            tb("0x1111", Some("0x1bc16d674ec80000")), // 2.0, unpriced
            tb("0x2222", Some("0x0")),
            tb("0x3333", None),
        ];
        let h = value_holdings("0x1bc16d674ec80000", &tokens, 25.0, &pegged()).unwrap();

        assert_eq!(h.balance_native, 2.0);
        // 2 HYPE native + 1 wHYPE
        assert!((h.balance_usd - 75.0).abs() < 1e-9);
        assert_eq!(h.token_count, 3);
    }

    #[test]
    fn unknown_contract_is_never_priced() {
        let tokens = vec![tb("0x9999", Some("0xde0b6b3a7640000"))];
        let h = value_holdings("0x0", &tokens, 25.0, &pegged()).unwrap();
        assert_eq!(h.balance_usd, 0.0);
        assert_eq!(h.token_count, 1);
    }

    #[test]
    fn pegged_match_ignores_address_case() {
        let pegged: HashSet<String> = ["0xabcdef".to_string()].into_iter().collect();
        let tokens = vec![tb("0xABCDEF", Some("0xde0b6b3a7640000"))];
        let h = value_holdings("0x0", &tokens, 10.0, &pegged).unwrap();
        assert_eq!(h.balance_usd, 10.0);
    }

    #[test]
    fn bad_token_quantity_fails_whole_wallet() {
        let tokens = vec![tb(WHYPE, Some("0xde0b6b3a7640000")), tb("0x1", Some("0xnope"))];
        assert!(value_holdings("0x1", &tokens, 25.0, &pegged()).is_err());
    }

    #[test]
    fn token_balances_parse_from_rpc_shape() {
        let body = r#"{"jsonrpc":"2.0","id":2,"result":{"address":"0xabc","tokenBalances":[
            {"contractAddress":"0x5555555555555555555555555555555555555555","tokenBalance":"0x0de0b6b3a7640000"},
            {"contractAddress":"0x1234","tokenBalance":null,"error":"execution reverted"}
        ]}}"#;
        let resp: RpcResponse<TokenBalancesResult> = serde_json::from_str(body).unwrap();
        let tokens = resp.result.unwrap().token_balances;
        assert_eq!(tokens.len(), 2);
        assert!(tokens[1].token_balance.is_none());
    }

    #[test]
    fn rpc_error_body_parses() {
        let body = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32602,"message":"invalid address"}}"#;
        let resp: RpcResponse<String> = serde_json::from_str(body).unwrap();
        assert!(resp.result.is_none());
        assert_eq!(resp.error.unwrap().code, -32602);
    }

    #[tokio::test]
    async fn zero_price_fails_without_network() {
        let mut cfg = Config::from_lookup(|_| None).unwrap();
        cfg.alchemy_hl_url = "http://127.0.0.1:9".to_string();
        let source = HyperliquidSource::new(&cfg).unwrap();

        let result = source.fetch("0xabc", 0.0).await;
        assert!(!result.success);
        assert_eq!(result.chain, Chain::Hyperliquid);
        assert_eq!(result.error.as_deref(), Some("native token price unavailable"));
    }

    #[derive(Clone, Copy)]
    enum TokenReply {
        Balances,
        RpcError,
        ServerError,
    }

    /// JSON-RPC node holding 2 HYPE native; the token call answers per `reply`.
    async fn spawn_rpc(reply: TokenReply) -> String {
        let app = Router::new().route(
            "/",
            post(move |Json(req): Json<Value>| async move {
                let id = req["id"].clone();
                match (req["method"].as_str(), reply) {
                    (Some("eth_getBalance"), _) => (
                        StatusCode::OK,
                        Json(json!({"jsonrpc": "2.0", "id": id, "result": "0x1bc16d674ec80000"})),
                    ),
                    (_, TokenReply::Balances) => (
                        StatusCode::OK,
                        Json(json!({"jsonrpc": "2.0", "id": id, "result": {"tokenBalances": [
                            {"contractAddress": WHYPE, "tokenBalance": "0xde0b6b3a7640000"}
                        ]}})),
                    ),
                    (_, TokenReply::RpcError) => (
                        StatusCode::OK,
                        Json(json!({"jsonrpc": "2.0", "id": id, "error": {"code": -32005, "message": "rate limited"}})),
                    ),
                    (_, TokenReply::ServerError) => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({}))),
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/")
    }

    fn source(rpc_url: &str) -> HyperliquidSource {
        let mut cfg = Config::from_lookup(|_| None).unwrap();
        cfg.alchemy_hl_url = rpc_url.to_string();
        HyperliquidSource::new(&cfg).unwrap()
    }

    #[tokio::test]
    async fn both_rpc_calls_succeeding_values_the_wallet() {
        let url = spawn_rpc(TokenReply::Balances).await;
        let result = source(&url).fetch("0xabc", 25.0).await;

        assert!(result.success);
        assert_eq!(result.balance_native, 2.0);
        assert!((result.balance_usd - 75.0).abs() < 1e-9);
        assert_eq!(result.token_count, 2);
    }

    #[tokio::test]
    async fn token_rpc_error_discards_native_balance() {
        let url = spawn_rpc(TokenReply::RpcError).await;
        let result = source(&url).fetch("0xabc", 25.0).await;

        assert!(!result.success);
        assert_eq!(result.balance_usd, 0.0);
        assert_eq!(result.balance_native, 0.0);
        assert_eq!(result.token_count, 0);
        assert!(result.error.unwrap().contains("rate limited"));
    }

    #[tokio::test]
    async fn token_http_500_discards_native_balance() {
        let url = spawn_rpc(TokenReply::ServerError).await;
        let result = source(&url).fetch("0xabc", 25.0).await;

        assert!(!result.success);
        assert_eq!(result.balance_usd, 0.0);
        assert_eq!(result.token_count, 0);
    }
}
