//! Shared health state for the /health endpoint.
//! Updated by the live-stats refresher and the deep refresh.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Shared health metrics. Updated by refresh tasks, read by API.
#[derive(Default)]
pub struct HealthState {
    /// Unix seconds of the last successful live-stats refresh (0 = none).
    pub last_stats_refresh_secs: AtomicU64,
    /// Unix seconds of the last completed wallet scan (0 = none).
    pub last_scan_secs: AtomicU64,
    /// Live-stats refreshes that failed since startup.
    pub stats_refresh_failures: AtomicU64,
    /// True while a deep refresh is collecting or scanning.
    pub deep_refresh_running: AtomicBool,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_last_stats_refresh(&self, secs: u64) {
        self.last_stats_refresh_secs.store(secs, Ordering::Relaxed);
    }

    pub fn set_last_scan(&self, secs: u64) {
        self.last_scan_secs.store(secs, Ordering::Relaxed);
    }

    pub fn inc_stats_refresh_failures(&self) {
        self.stats_refresh_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Claims the deep-refresh slot. False if a refresh is already running.
    pub fn try_begin_deep_refresh(&self) -> bool {
        self.deep_refresh_running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn end_deep_refresh(&self) {
        self.deep_refresh_running.store(false, Ordering::Release);
    }

    pub fn last_stats_refresh(&self) -> u64 {
        self.last_stats_refresh_secs.load(Ordering::Relaxed)
    }

    pub fn last_scan(&self) -> u64 {
        self.last_scan_secs.load(Ordering::Relaxed)
    }

    pub fn stats_refresh_failures(&self) -> u64 {
        self.stats_refresh_failures.load(Ordering::Relaxed)
    }

    pub fn deep_refresh_running(&self) -> bool {
        self.deep_refresh_running.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deep_refresh_slot_is_exclusive() {
        let health = HealthState::new();
        assert!(health.try_begin_deep_refresh());
        assert!(!health.try_begin_deep_refresh());
        health.end_deep_refresh();
        assert!(health.try_begin_deep_refresh());
    }
}
