//! Per-question counters for the relay.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters, one increment per resolved question.
#[derive(Default)]
pub struct Stats {
    pub questions: AtomicU64,
    pub intercepted: AtomicU64,
    pub forwarded: AtomicU64,
    pub dropped: AtomicU64,
    /// Forwarded questions whose exchange failed.
    pub failed: AtomicU64,
    /// Cumulative upstream time in microseconds for averaging.
    total_upstream_us: AtomicU64,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_intercepted(&self) {
        self.questions.fetch_add(1, Ordering::Relaxed);
        self.intercepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.questions.fetch_add(1, Ordering::Relaxed);
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_forwarded(&self, upstream_ms: f64, ok: bool) {
        self.questions.fetch_add(1, Ordering::Relaxed);
        self.forwarded.fetch_add(1, Ordering::Relaxed);
        if !ok {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        self.total_upstream_us
            .fetch_add((upstream_ms * 1000.0) as u64, Ordering::Relaxed);
    }

    pub fn snapshot_and_reset(&self) -> StatsSnapshot {
        let questions = self.questions.swap(0, Ordering::Relaxed);
        let intercepted = self.intercepted.swap(0, Ordering::Relaxed);
        let forwarded = self.forwarded.swap(0, Ordering::Relaxed);
        let dropped = self.dropped.swap(0, Ordering::Relaxed);
        let failed = self.failed.swap(0, Ordering::Relaxed);
        let total_us = self.total_upstream_us.swap(0, Ordering::Relaxed);

        let avg_upstream_ms = if forwarded > 0 {
            (total_us as f64 / forwarded as f64) / 1000.0
        } else {
            0.0
        };

        StatsSnapshot {
            questions,
            intercepted,
            forwarded,
            dropped,
            failed,
            avg_upstream_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatsSnapshot {
    pub questions: u64,
    pub intercepted: u64,
    pub forwarded: u64,
    pub dropped: u64,
    pub failed: u64,
    pub avg_upstream_ms: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_counts_and_resets() {
        let stats = Stats::new();
        stats.record_intercepted();
        stats.record_dropped();
        stats.record_forwarded(2.0, true);
        stats.record_forwarded(4.0, false);

        let snapshot = stats.snapshot_and_reset();

        assert_eq!(snapshot.questions, 4);
        assert_eq!(snapshot.intercepted, 1);
        assert_eq!(snapshot.dropped, 1);
        assert_eq!(snapshot.forwarded, 2);
        assert_eq!(snapshot.failed, 1);
        assert!((snapshot.avg_upstream_ms - 3.0).abs() < 1e-9);
        assert_eq!(stats.snapshot_and_reset().questions, 0);
    }
}
