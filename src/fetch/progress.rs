//! Throttled download progress lines.

use std::time::{Duration, Instant};

/// Whole-number percentage, or `None` when the length is unknown or zero.
pub fn percent(received: u64, total: Option<u64>) -> Option<u64> {
    match total {
        Some(total) if total > 0 => Some(received.saturating_mul(100) / total),
        _ => None,
    }
}

/// Emits at most one progress line per interval for a single asset.
#[derive(Debug)]
pub struct ProgressReporter {
    asset: String,
    total: Option<u64>,
    received: u64,
    interval: Duration,
    last_report: Instant,
}

impl ProgressReporter {
    pub fn new(asset: impl Into<String>, total: Option<u64>, interval: Duration) -> Self {
        Self {
            asset: asset.into(),
            total,
            received: 0,
            interval,
            last_report: Instant::now(),
        }
    }

    /// Record `bytes` more. Returns true when a line was emitted.
    pub fn advance(&mut self, bytes: u64) -> bool {
        self.received += bytes;
        if self.last_report.elapsed() < self.interval {
            return false;
        }
        self.last_report = Instant::now();
        self.report();
        true
    }

    pub fn received(&self) -> u64 {
        self.received
    }

    fn report(&self) {
        match percent(self.received, self.total) {
            Some(pct) => {
                tracing::info!(asset = %self.asset, "Downloading {}: {}%", self.asset, pct)
            }
            None => tracing::info!(
                asset = %self.asset,
                bytes = self.received,
                "Downloading {}: progress unknown",
                self.asset
            ),
        }
    }
}
