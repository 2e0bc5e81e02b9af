use crate::config::spam_thresholds::HIGH_VALUE_USD;
use crate::types::TokenBalance;

/// Symbols that are never treated as spam.
const LEGITIMATE_TOKENS: &[&str] = &[
    "eth", "weth", "usdt", "usdc", "dai", "wbtc", "link", "uni", "aave", "mkr", "snx", "comp",
    "crv", "bal", "yfi", "sushi", "matic", "ftm", "avax", "bnb", "sol", "ada", "dot", "atom",
    "near", "algo", "xlm", "steth", "reth", "cbeth", "frax", "lusd", "gusd", "tusd", "busd",
    "ezeth", "paxg", "blur", "ape", "pepe", "shib",
];

/// Substrings seen in phishing airdrops, matched against symbol and name.
const PHISHING_PATTERNS: &[&str] = &[
    "visit", "claim", "http", ".com", ".net", ".org", ".io", "airdrop", "reward", "bonus",
    "free", "gift", "voucher", "access", "ethg", "aicc", "zepe",
];

/// Symbols confirmed as scam tokens.
const KNOWN_SPAM_SYMBOLS: &[&str] = &["ethg", "aicc", "zepe"];

pub fn is_legitimate_symbol(symbol: &str) -> bool {
    LEGITIMATE_TOKENS.contains(&symbol.to_lowercase().as_str())
}

/// Classify a holding as spam. Rules run in order and the first match wins:
/// allowlisted symbol → keep; phishing pattern or known-bad symbol → spam;
/// unrecognized token worth more than `HIGH_VALUE_USD` → spam; otherwise keep.
pub fn is_spam(balance: &TokenBalance) -> bool {
    if is_legitimate_symbol(&balance.symbol) {
        return false;
    }

    let symbol = balance.symbol.to_lowercase();
    let name = balance.name.to_lowercase();

    if PHISHING_PATTERNS
        .iter()
        .any(|p| symbol.contains(p) || name.contains(p))
    {
        return true;
    }

    if KNOWN_SPAM_SYMBOLS.contains(&symbol.as_str()) {
        return true;
    }

    // No rule on raw_amount: unknown whether the source reports it decimal-adjusted.
    balance.value_usd > HIGH_VALUE_USD
}

/// Split holdings into `(legitimate, spam)`, preserving order within each side.
pub fn partition_spam(balances: Vec<TokenBalance>) -> (Vec<TokenBalance>, Vec<TokenBalance>) {
    balances.into_iter().partition(|b| !is_spam(b))
}
