//! Pipeline counters

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counters updated by the pipeline. Cheap to share; read with
/// [`PipelineStats::snapshot`].
#[derive(Debug, Default)]
pub struct PipelineStats {
    requests: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    rejections: AtomicU64,
    unresolved: AtomicU64,
    executions: AtomicU64,
    retries: AtomicU64,
    failures: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub rejections: u64,
    pub unresolved: u64,
    pub executions: u64,
    pub retries: u64,
    pub failures: u64,
    pub fallback_schema_loads: u64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejection(&self) {
        self.rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unresolved(&self) {
        self.unresolved.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_execution(&self) {
        self.executions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Current values. Fallback schema loads are owned by the schema
    /// provider and passed in.
    pub fn snapshot(&self, fallback_schema_loads: u64) -> StatsSnapshot {
        StatsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            rejections: self.rejections.load(Ordering::Relaxed),
            unresolved: self.unresolved.load(Ordering::Relaxed),
            executions: self.executions.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            fallback_schema_loads,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let stats = PipelineStats::new();
        stats.record_request();
        stats.record_request();
        stats.record_cache_miss();
        stats.record_cache_hit();
        stats.record_retry();

        let snap = stats.snapshot(1);
        assert_eq!(snap.requests, 2);
        assert_eq!(snap.cache_hits, 1);
        assert_eq!(snap.cache_misses, 1);
        assert_eq!(snap.retries, 1);
        assert_eq!(snap.executions, 0);
        assert_eq!(snap.fallback_schema_loads, 1);
    }

    #[test]
    fn test_snapshot_serializes() {
        let json = serde_json::to_value(PipelineStats::new().snapshot(0)).unwrap();
        assert_eq!(json["requests"], 0);
        assert_eq!(json["fallback_schema_loads"], 0);
    }
}
