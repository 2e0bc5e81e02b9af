pub mod export;
pub mod json;

pub use export::{export_collections, export_wallet_list};
pub use json::{
    ensure_dir, load_collection_data, load_scan_summary, save_collection_data, save_scan_summary,
};
