//! DashMap Resolution Metrics
//!
//! Implements ResolutionMetrics using DashMap for lock-free concurrent access.

use crate::domain::ports::{MetricsSnapshot, ResolutionMetrics};
use crate::domain::value_objects::{ResolutionStatus, ZoneLevel};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Counters for one resolution status.
#[derive(Debug, Default)]
pub struct OutcomeMetrics {
    /// Number of resolutions with this status
    pub count: AtomicU64,
    /// Accumulated resolution time in microseconds
    pub total_us: AtomicU64,
}

/// DashMap-backed metrics store.
///
/// Resolver threads update disjoint entries most of the time, so shard
/// locking in DashMap keeps contention low.
pub struct DashMapResolutionMetrics {
    outcomes: DashMap<ResolutionStatus, OutcomeMetrics>,
    overlaps: DashMap<ZoneLevel, AtomicU64>,
}

impl DashMapResolutionMetrics {
    pub fn new() -> Self {
        Self {
            outcomes: DashMap::new(),
            overlaps: DashMap::new(),
        }
    }

    /// Total resolutions across all statuses.
    pub fn total(&self) -> u64 {
        self.outcomes
            .iter()
            .map(|e| e.count.load(Ordering::Relaxed))
            .sum()
    }
}

impl Default for DashMapResolutionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ResolutionMetrics for DashMapResolutionMetrics {
    fn record_outcome(&self, status: ResolutionStatus, elapsed: Duration) {
        let entry = self.outcomes.entry(status).or_default();
        entry.count.fetch_add(1, Ordering::Relaxed);
        entry
            .total_us
            .fetch_add(elapsed.as_micros().min(u64::MAX as u128) as u64, Ordering::Relaxed);
    }

    fn record_overlap(&self, level: ZoneLevel, codes: &[&str]) {
        let previous = self
            .overlaps
            .entry(level)
            .or_default()
            .fetch_add(1, Ordering::Relaxed);
        // Warn on the first occurrence and then periodically to keep logs readable.
        if previous == 0 || (previous + 1) % 1000 == 0 {
            tracing::warn!(
                level = %level,
                matches = ?codes,
                occurrences = previous + 1,
                "overlapping {} boundaries, first match wins",
                level
            );
        }
    }

    fn outcome_count(&self, status: ResolutionStatus) -> u64 {
        self.outcomes
            .get(&status)
            .map(|m| m.count.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn overlap_count(&self, level: ZoneLevel) -> u64 {
        self.overlaps
            .get(&level)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn snapshot(&self) -> MetricsSnapshot {
        let mut snapshot = MetricsSnapshot::default();
        let mut total_us = 0u64;

        for status in ResolutionStatus::ALL {
            let (count, us) = self
                .outcomes
                .get(&status)
                .map(|m| (m.count.load(Ordering::Relaxed), m.total_us.load(Ordering::Relaxed)))
                .unwrap_or((0, 0));
            snapshot.outcomes.insert(status.as_str().to_string(), count);
            snapshot.total += count;
            total_us = total_us.saturating_add(us);
        }

        for level in ZoneLevel::ALL {
            snapshot
                .overlaps
                .insert(level.as_str().to_string(), self.overlap_count(level));
        }

        if snapshot.total > 0 {
            snapshot.mean_latency_us = total_us as f64 / snapshot.total as f64;
        }
        snapshot
    }
}
