use std::collections::BTreeMap;

use crate::types::{Category, CollectionRecord, CollectionRow, CollectionSummary, LiveStats};

const NFT_KEYWORDS: &[&str] = &[
    "pudgy", "moonbirds", "azuki", "bayc", "mayc", "doodles", "cryptopunks", "meebits", "beanz",
    "bakc", "otherdeed", "yuga",
];

const DEFI_KEYWORDS: &[&str] = &[
    "hyperliquid", "aave", "uniswap", "compound", "curve", "balancer", "sushiswap", "dydx", "lido",
    "rocketpool",
];

/// Case-insensitive substring match; NFT keywords take precedence.
pub fn categorize(entity: &str) -> Category {
    let lower = entity.to_lowercase();
    if NFT_KEYWORDS.iter().any(|k| lower.contains(k)) {
        Category::Nft
    } else if DEFI_KEYWORDS.iter().any(|k| lower.contains(k)) {
        Category::Defi
    } else {
        Category::Other
    }
}

/// Rank collections by unique wallets and attach share-of-total and category.
///
/// Sorting is stable, so equal counts keep their input order and still get
/// distinct consecutive ranks. Percentages are rounded to two decimals and are
/// all zero when no collection has any wallets.
pub fn aggregate(records: Vec<CollectionRecord>) -> Vec<CollectionRow> {
    let mut records = records;
    records.sort_by(|a, b| b.unique_wallets.cmp(&a.unique_wallets));

    let total: u64 = records.iter().map(|r| r.unique_wallets).sum();

    records
        .into_iter()
        .enumerate()
        .map(|(i, r)| {
            let percentage = if total > 0 {
                round2(r.unique_wallets as f64 / total as f64 * 100.0)
            } else {
                0.0
            };
            CollectionRow {
                category: categorize(&r.entity),
                entity: r.entity,
                unique_wallets: r.unique_wallets,
                total_activities: r.total_activities,
                stats: r.stats,
                rank: i + 1,
                percentage,
            }
        })
        .collect()
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Headline numbers for a ranked pass. `rows` must already be in rank order.
pub fn summarize(rows: &[CollectionRow], total_unique_wallets: u64) -> CollectionSummary {
    let Some(top) = rows.first() else {
        return CollectionSummary {
            total_unique_wallets,
            ..CollectionSummary::default()
        };
    };

    let n = rows.len();
    let wallet_sum: u64 = rows.iter().map(|r| r.unique_wallets).sum();

    let mut counts: Vec<u64> = rows.iter().map(|r| r.unique_wallets).collect();
    counts.sort_unstable();
    let median = if n % 2 == 1 {
        counts[n / 2] as f64
    } else {
        (counts[n / 2 - 1] + counts[n / 2]) as f64 / 2.0
    };

    let mut wallets_by_category = BTreeMap::new();
    for r in rows {
        *wallets_by_category.entry(r.category).or_insert(0) += r.unique_wallets;
    }

    CollectionSummary {
        total_collections: n,
        total_claims: wallet_sum,
        total_unique_wallets,
        top_collection: top.entity.clone(),
        top_collection_wallets: top.unique_wallets,
        avg_wallets_per_collection: wallet_sum as f64 / n as f64,
        median_wallets_per_collection: median,
        wallets_by_category,
    }
}

/// One record per entity from the overall stats counters. The per-entity
/// count stands in for both unique wallets and activities.
pub fn rows_from_live_stats(stats: &LiveStats) -> Vec<CollectionRecord> {
    stats
        .by_entity
        .iter()
        .map(|(entity, &count)| CollectionRecord::new(entity.clone(), count, count))
        .collect()
}
