pub mod merger;
pub mod wallet_scanner;

pub use merger::{merge_wallet_balances, MultiChainFetcher, WalletFetcher};
pub use wallet_scanner::WalletScanner;
