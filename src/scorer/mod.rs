pub mod collection_metrics;

pub use collection_metrics::{aggregate, categorize, rows_from_live_stats, summarize};
