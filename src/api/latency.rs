//! In-memory latency histogram for per-wallet fetch instrumentation.
//! The scanner records the wall time of each merged wallet fetch.

use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;

use crate::error::{AppError, Result};

/// Shared fetch latency stats. Scanner records, API reads.
/// Values stored in milliseconds.
pub struct FetchLatency {
    inner: Mutex<hdrhistogram::Histogram<u64>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LatencySnapshot {
    pub samples: u64,
    pub p50_ms: Option<u64>,
    pub p95_ms: Option<u64>,
    pub p99_ms: Option<u64>,
    pub max_ms: Option<u64>,
}

impl FetchLatency {
    /// Tracks 1ms to 10min, 3 significant figures.
    pub fn new() -> Result<Self> {
        let histogram = hdrhistogram::Histogram::new_with_bounds(1, 600_000, 3)
            .map_err(|e| AppError::Bootstrap(format!("latency histogram: {e}")))?;
        Ok(Self {
            inner: Mutex::new(histogram),
        })
    }

    pub fn record(&self, d: Duration) {
        let ms = d.as_millis().clamp(1, 600_000) as u64;
        if let Ok(mut h) = self.inner.lock() {
            let _ = h.record(ms);
        }
    }

    pub fn snapshot(&self) -> LatencySnapshot {
        let Ok(h) = self.inner.lock() else {
            return LatencySnapshot::default();
        };
        if h.len() == 0 {
            return LatencySnapshot::default();
        }
        LatencySnapshot {
            samples: h.len(),
            p50_ms: Some(h.value_at_quantile(0.5)),
            p95_ms: Some(h.value_at_quantile(0.95)),
            p99_ms: Some(h.value_at_quantile(0.99)),
            max_ms: Some(h.max()),
        }
    }
}
