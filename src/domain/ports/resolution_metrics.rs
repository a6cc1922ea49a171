//! Resolution Metrics Port
//!
//! Defines the interface for recording resolution outcomes.

use crate::domain::value_objects::{ResolutionStatus, ZoneLevel};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Store for runtime resolution metrics.
///
/// Overlaps are the observable side of first-match-wins tie-breaking:
/// every time more than one polygon (or police zone membership) matched,
/// the level is counted.
pub trait ResolutionMetrics: Send + Sync {
    /// Record one finished resolution.
    fn record_outcome(&self, status: ResolutionStatus, elapsed: Duration);

    /// Record that several zones of `level` matched and the first won.
    fn record_overlap(&self, level: ZoneLevel, codes: &[&str]);

    /// Number of resolutions recorded with `status`.
    fn outcome_count(&self, status: ResolutionStatus) -> u64;

    /// Number of overlaps recorded for `level`.
    fn overlap_count(&self, level: ZoneLevel) -> u64;

    /// Point-in-time copy of all counters.
    fn snapshot(&self) -> MetricsSnapshot;
}

/// Serializable view of the metrics store.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub outcomes: BTreeMap<String, u64>,
    pub overlaps: BTreeMap<String, u64>,
    pub total: u64,
    pub mean_latency_us: f64,
}
