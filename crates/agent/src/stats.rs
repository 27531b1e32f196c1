//! Lock-free counters of pipeline outcomes.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::fallback::FallbackReason;

#[derive(Debug, Default)]
pub struct PipelineStats {
    replies_generated: AtomicU64,
    titles_generated: AtomicU64,
    fallback_unavailable: AtomicU64,
    fallback_failure: AtomicU64,
    fallback_timeout: AtomicU64,
    fallback_low_quality: AtomicU64,
}

/// Point-in-time copy of [`PipelineStats`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub replies_generated: u64,
    pub titles_generated: u64,
    pub fallback_unavailable: u64,
    pub fallback_failure: u64,
    pub fallback_timeout: u64,
    pub fallback_low_quality: u64,
}

impl StatsSnapshot {
    pub fn fallbacks(&self) -> u64 {
        self.fallback_unavailable
            + self.fallback_failure
            + self.fallback_timeout
            + self.fallback_low_quality
    }
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_reply(&self) {
        self.replies_generated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_title(&self) {
        self.titles_generated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fallback(&self, reason: FallbackReason) {
        let counter = match reason {
            FallbackReason::Unavailable => &self.fallback_unavailable,
            FallbackReason::Failure => &self.fallback_failure,
            FallbackReason::Timeout => &self.fallback_timeout,
            FallbackReason::LowQuality => &self.fallback_low_quality,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            replies_generated: self.replies_generated.load(Ordering::Relaxed),
            titles_generated: self.titles_generated.load(Ordering::Relaxed),
            fallback_unavailable: self.fallback_unavailable.load(Ordering::Relaxed),
            fallback_failure: self.fallback_failure.load(Ordering::Relaxed),
            fallback_timeout: self.fallback_timeout.load(Ordering::Relaxed),
            fallback_low_quality: self.fallback_low_quality.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_by_class() {
        let stats = PipelineStats::new();
        stats.record_reply();
        stats.record_reply();
        stats.record_title();
        stats.record_fallback(FallbackReason::Timeout);
        stats.record_fallback(FallbackReason::LowQuality);
        stats.record_fallback(FallbackReason::LowQuality);

        let snap = stats.snapshot();
        assert_eq!(snap.replies_generated, 2);
        assert_eq!(snap.titles_generated, 1);
        assert_eq!(snap.fallback_timeout, 1);
        assert_eq!(snap.fallback_low_quality, 2);
        assert_eq!(snap.fallbacks(), 3);
    }

    #[test]
    fn snapshot_serializes_flat() {
        let json = serde_json::to_value(StatsSnapshot::default()).unwrap();
        assert_eq!(json["fallback_unavailable"], 0);
        assert_eq!(json.as_object().unwrap().len(), 6);
    }
}
