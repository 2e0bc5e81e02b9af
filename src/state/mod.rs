pub mod price_cache;
pub mod report_store;

pub use price_cache::{CoinGeckoSource, PriceCache, SystemClock};
pub use report_store::ReportStore;
