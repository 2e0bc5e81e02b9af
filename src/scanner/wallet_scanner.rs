use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use futures_util::future::join_all;
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};

use crate::api::latency::FetchLatency;
use crate::config::{Config, SCAN_PROGRESS_EVERY};
use crate::scanner::WalletFetcher;
use crate::types::{ScanSummary, WalletMergedResult};

/// Fans wallet fetches out over a fixed worker pool.
///
/// Addresses are pushed into a bounded job queue; once it holds
/// `queue_capacity` pending addresses the producer waits for a worker to take
/// one. Results are gathered in completion order, not input order.
pub struct WalletScanner {
    fetcher: Arc<dyn WalletFetcher>,
    workers: usize,
    queue_capacity: usize,
    latency: Option<Arc<FetchLatency>>,
}

impl WalletScanner {
    pub fn new(fetcher: Arc<dyn WalletFetcher>, workers: usize, queue_capacity: usize) -> Self {
        Self {
            fetcher,
            workers: workers.max(1),
            queue_capacity: queue_capacity.max(1),
            latency: None,
        }
    }

    pub fn from_config(fetcher: Arc<dyn WalletFetcher>, cfg: &Config) -> Self {
        Self::new(fetcher, cfg.scan_workers, cfg.scan_queue_capacity())
    }

    pub fn with_latency(mut self, latency: Arc<FetchLatency>) -> Self {
        self.latency = Some(latency);
        self
    }

    pub async fn scan(&self, addresses: &[String]) -> ScanSummary {
        let unique = dedup_addresses(addresses);
        let total = unique.len();

        if self.fetcher.native_price_usd().await <= 0.0 {
            warn!("[SCAN] no native price available yet, Hyperliquid balances may be skipped");
        }

        info!(
            wallets = total,
            duplicates = addresses.len() - total,
            workers = self.workers,
            queue = self.queue_capacity,
            "[SCAN] scanning {total} wallets across 2 chains",
        );

        if total == 0 {
            let price = self.fetcher.native_price_usd().await;
            return ScanSummary::from_results(Vec::new(), 0, price);
        }

        let (job_tx, job_rx) = mpsc::channel::<String>(self.queue_capacity);
        let job_rx = Arc::new(Mutex::new(job_rx));
        let (result_tx, mut result_rx) = mpsc::channel::<WalletMergedResult>(total);

        let mut handles = Vec::with_capacity(self.workers);
        for _ in 0..self.workers {
            let job_rx = Arc::clone(&job_rx);
            let result_tx = result_tx.clone();
            let fetcher = Arc::clone(&self.fetcher);
            let latency = self.latency.clone();

            handles.push(tokio::spawn(async move {
                loop {
                    let next = job_rx.lock().await.recv().await;
                    let Some(address) = next else { break };

                    let started = Instant::now();
                    let result = fetcher.fetch_wallet(&address).await;
                    if let Some(latency) = &latency {
                        latency.record(started.elapsed());
                    }

                    if result_tx.send(result).await.is_err() {
                        break;
                    }
                }
            }));
        }
        drop(result_tx);

        let producer = tokio::spawn(async move {
            for address in unique {
                if job_tx.send(address).await.is_err() {
                    break;
                }
            }
        });

        let started = Instant::now();
        let mut results = Vec::with_capacity(total);
        while let Some(result) = result_rx.recv().await {
            results.push(result);
            let done = results.len();
            if done % SCAN_PROGRESS_EVERY == 0 || done == total {
                info!(done, total, "[SCAN] progress: {done}/{total} wallets");
            }
        }

        if let Err(e) = producer.await {
            warn!("[SCAN] producer task failed: {e}");
        }
        for joined in join_all(handles).await {
            if let Err(e) = joined {
                warn!("[SCAN] worker task failed: {e}");
            }
        }

        // Stamp the price the last wallets were valued at.
        let price = self.fetcher.native_price_usd().await;
        let summary = ScanSummary::from_results(results, total, price);
        info!(
            scanned = summary.wallets_scanned,
            successful = summary.wallets_successful,
            total_usd = summary.total_value_usd,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "[SCAN] complete: ${:.2} across {} wallets ({} ok)",
            summary.total_value_usd,
            summary.wallets_scanned,
            summary.wallets_successful,
        );
        summary
    }
}

/// First occurrence wins; input order is otherwise preserved.
pub fn dedup_addresses(addresses: &[String]) -> Vec<String> {
    let mut seen = HashSet::with_capacity(addresses.len());
    addresses
        .iter()
        .filter(|a| seen.insert(a.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Sleeps per fetch and tracks the peak number of fetches in flight.
    #[derive(Default)]
    struct CountingFetcher {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl WalletFetcher for CountingFetcher {
        async fn native_price_usd(&self) -> f64 {
            25.0
        }

        async fn fetch_wallet(&self, address: &str) -> WalletMergedResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            // odd-numbered addresses fail
            let n: usize = address.trim_start_matches("0x").parse().unwrap_or(0);
            let success = n % 2 == 0;
            WalletMergedResult {
                address: address.to_string(),
                balance_usd: if success { 10.0 } else { 0.0 },
                eth_balance_usd: if success { 10.0 } else { 0.0 },
                hl_balance_usd: 0.0,
                hl_balance_hype: 0.0,
                token_count: usize::from(success),
                success,
            }
        }
    }

    fn addresses(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("0x{i}")).collect()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn never_exceeds_worker_count_in_flight() {
        let fetcher = Arc::new(CountingFetcher::default());
        let scanner = WalletScanner::new(fetcher.clone(), 5, 10);

        let summary = scanner.scan(&addresses(40)).await;

        assert_eq!(summary.wallets_scanned, 40);
        assert_eq!(summary.wallet_balances.len(), 40);
        assert!(fetcher.peak.load(Ordering::SeqCst) <= 5);
        assert!(fetcher.peak.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn average_counts_successful_wallets_only() {
        let scanner = WalletScanner::new(Arc::new(CountingFetcher::default()), 5, 10);
        let summary = scanner.scan(&addresses(10)).await;

        assert_eq!(summary.wallets_successful, 5);
        assert_eq!(summary.total_value_usd, 50.0);
        assert_eq!(summary.avg_value_usd, 10.0);
        assert_eq!(summary.hype_price, 25.0);
    }

    #[tokio::test]
    async fn duplicate_addresses_are_fetched_once() {
        let fetcher = Arc::new(CountingFetcher::default());
        let scanner = WalletScanner::new(fetcher.clone(), 5, 10);
        let input: Vec<String> = ["0x2", "0x4", "0x2", "0x2"].iter().map(|s| s.to_string()).collect();

        let summary = scanner.scan(&input).await;

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
        assert_eq!(summary.wallets_scanned, 2);
        assert_eq!(summary.total_value_usd, 20.0);
    }

    #[tokio::test]
    async fn empty_input_yields_empty_summary() {
        let scanner = WalletScanner::new(Arc::new(CountingFetcher::default()), 5, 10);
        let summary = scanner.scan(&[]).await;
        assert_eq!(summary.wallets_scanned, 0);
        assert_eq!(summary.avg_value_usd, 0.0);
    }

    #[tokio::test]
    async fn queue_of_one_still_drains() {
        let scanner = WalletScanner::new(Arc::new(CountingFetcher::default()), 3, 1);
        let summary = scanner.scan(&addresses(12)).await;
        assert_eq!(summary.wallet_balances.len(), 12);
    }

    #[tokio::test]
    async fn latency_is_recorded_per_wallet() {
        let latency = Arc::new(FetchLatency::new().unwrap());
        let scanner = WalletScanner::new(Arc::new(CountingFetcher::default()), 5, 10)
            .with_latency(Arc::clone(&latency));
        scanner.scan(&addresses(7)).await;
        assert_eq!(latency.snapshot().samples, 7);
    }

    #[test]
    fn dedup_keeps_first_seen_order() {
        let input: Vec<String> = ["b", "a", "b", "c", "a"].iter().map(|s| s.to_string()).collect();
        assert_eq!(dedup_addresses(&input), vec!["b", "a", "c"]);
    }
}
