//! Resolution Service - Main application use case
//!
//! Wires the boundary cache, the resolver, metrics and the audit log
//! writer into the surface consumed by ETL jobs and the HTTP API.

use crate::application::{BoundaryCache, LogWriterStats, ResolutionLogWriter};
use crate::domain::entities::{ResolutionResult, Zone};
use crate::domain::error::BoundaryLoadError;
use crate::domain::ports::{MetricsSnapshot, ResolutionMetrics};
use crate::domain::services::{BoundarySnapshot, HierarchyAggregator, Resolver};
use crate::domain::value_objects::{BoundingBox, Coordinate, ResolutionStatus, ZoneLevel};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Instant, UNIX_EPOCH};

/// Summary of the active snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotInfo {
    pub version: u64,
    pub source: String,
    pub index: &'static str,
    pub loaded_at_ms: u64,
    pub bounds: BoundingBox,
    pub counts: BTreeMap<&'static str, usize>,
    pub unmapped_districts: usize,
    pub membership_conflicts: usize,
}

impl SnapshotInfo {
    fn of(snapshot: &BoundarySnapshot) -> Self {
        let counts = ZoneLevel::ALL
            .iter()
            .map(|level| (level.plural(), snapshot.count(*level)))
            .collect();
        let loaded_at_ms = snapshot
            .loaded_at()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        Self {
            version: snapshot.version(),
            source: snapshot.source().to_string(),
            index: snapshot.index_kind(),
            loaded_at_ms,
            bounds: *snapshot.bounds(),
            counts,
            unmapped_districts: HierarchyAggregator::new(snapshot).unmapped_districts().len(),
            membership_conflicts: snapshot.membership_conflicts().len(),
        }
    }
}

/// Service-wide counters.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceMetrics {
    pub resolutions: MetricsSnapshot,
    pub audit_log: LogWriterStats,
    pub snapshot_version: u64,
    pub snapshot_loads: u64,
}

/// Resolution service - main application use case.
///
/// Every call resolves against whichever snapshot is active when it
/// starts; a batch shares one snapshot end to end.
pub struct ResolutionService {
    cache: Arc<BoundaryCache>,
    metrics: Arc<dyn ResolutionMetrics>,
    log: Arc<ResolutionLogWriter>,
    governorate_fallback: bool,
}

impl ResolutionService {
    pub fn new(
        cache: Arc<BoundaryCache>,
        metrics: Arc<dyn ResolutionMetrics>,
        log: Arc<ResolutionLogWriter>,
        governorate_fallback: bool,
    ) -> Self {
        Self {
            cache,
            metrics,
            log,
            governorate_fallback,
        }
    }

    /// Resolve one coordinate to its governorate, district, block and
    /// police zone.
    ///
    /// Only fails when no boundary snapshot could ever be loaded; every
    /// per-coordinate outcome, including all-null, is a result.
    pub fn resolve(&self, lat: f64, lon: f64) -> Result<ResolutionResult, BoundaryLoadError> {
        let started = Instant::now();
        let snapshot = self.cache.snapshot()?;
        Ok(self.resolve_on(&snapshot, Coordinate::new(lat, lon), started))
    }

    /// Resolve many coordinates against a single snapshot.
    pub fn resolve_batch(
        &self,
        coords: &[Coordinate],
    ) -> Result<Vec<ResolutionResult>, BoundaryLoadError> {
        let snapshot = self.cache.snapshot()?;
        let results: Vec<ResolutionResult> = coords
            .iter()
            .map(|coord| self.resolve_on(&snapshot, *coord, Instant::now()))
            .collect();

        tracing::debug!(
            size = results.len(),
            version = snapshot.version(),
            "resolved batch"
        );
        Ok(results)
    }

    fn resolve_on(
        &self,
        snapshot: &BoundarySnapshot,
        coord: Coordinate,
        started: Instant,
    ) -> ResolutionResult {
        let metrics = &self.metrics;
        let result = Resolver::new(snapshot)
            .with_governorate_fallback(self.governorate_fallback)
            .resolve(coord, |level, codes| metrics.record_overlap(level, codes));
        let elapsed = started.elapsed();

        match result.status {
            ResolutionStatus::OutOfBounds => {
                tracing::debug!(%coord, "coordinate outside covered region")
            }
            ResolutionStatus::Unresolved => {
                tracing::debug!(%coord, "coordinate inside region but in no district")
            }
            _ => {}
        }

        self.metrics.record_outcome(result.status, elapsed);
        self.log.record(coord, &result, elapsed);
        result
    }

    /// Load fresh boundaries and swap them in. Returns the new version.
    pub fn reload(&self) -> Result<u64, BoundaryLoadError> {
        self.cache.reload().map(|snapshot| snapshot.version())
    }

    /// Force the next call to reload.
    pub fn invalidate(&self) {
        self.cache.invalidate();
    }

    /// Districts covered by a police zone; `None` if the zone is unknown.
    pub fn districts_in_police_zone(
        &self,
        code: &str,
    ) -> Result<Option<Vec<Zone>>, BoundaryLoadError> {
        self.with_hierarchy(|h| h.districts_in_police_zone(code).map(owned))
    }

    /// Blocks of a district; `None` if the district is unknown.
    pub fn blocks_in_district(&self, code: &str) -> Result<Option<Vec<Zone>>, BoundaryLoadError> {
        self.with_hierarchy(|h| h.blocks_in_district(code).map(owned))
    }

    /// Districts of a governorate; `None` if the governorate is unknown.
    pub fn districts_in_governorate(
        &self,
        code: &str,
    ) -> Result<Option<Vec<Zone>>, BoundaryLoadError> {
        self.with_hierarchy(|h| h.districts_in_governorate(code).map(owned))
    }

    pub fn zones(&self, level: ZoneLevel) -> Result<Vec<Zone>, BoundaryLoadError> {
        self.with_hierarchy(|h| owned(h.zones(level)))
    }

    pub fn zone(&self, level: ZoneLevel, code: &str) -> Result<Option<Zone>, BoundaryLoadError> {
        let snapshot = self.cache.snapshot()?;
        Ok(snapshot.zone(level, code).cloned())
    }

    /// Districts no police zone covers.
    pub fn unmapped_districts(&self) -> Result<Vec<Zone>, BoundaryLoadError> {
        self.with_hierarchy(|h| owned(h.unmapped_districts()))
    }

    fn with_hierarchy<T, F>(&self, f: F) -> Result<T, BoundaryLoadError>
    where
        F: FnOnce(&HierarchyAggregator<'_>) -> T,
    {
        let snapshot = self.cache.snapshot()?;
        Ok(f(&HierarchyAggregator::new(&snapshot)))
    }

    /// Active snapshot summary without triggering a load.
    pub fn snapshot_info(&self) -> Option<SnapshotInfo> {
        self.cache.current().map(|snapshot| SnapshotInfo::of(&snapshot))
    }

    pub fn metrics(&self) -> ServiceMetrics {
        ServiceMetrics {
            resolutions: self.metrics.snapshot(),
            audit_log: self.log.stats(),
            snapshot_version: self.cache.version(),
            snapshot_loads: self.cache.load_count(),
        }
    }

    pub fn cache(&self) -> &Arc<BoundaryCache> {
        &self.cache
    }

    pub fn log_writer(&self) -> &Arc<ResolutionLogWriter> {
        &self.log
    }
}

fn owned(zones: Vec<&Zone>) -> Vec<Zone> {
    zones.into_iter().cloned().collect()
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::adapters::outbound::{DashMapResolutionMetrics, RTreeIndexFactory, SqliteResolutionLog};
    use crate::application::fixtures::{kuwait, ScriptedSource};

    fn service_with(source: Arc<ScriptedSource>, fallback: bool) -> ResolutionService {
        let cache = Arc::new(BoundaryCache::new(
            source,
            Arc::new(RTreeIndexFactory),
            BoundingBox::KUWAIT,
        ));
        ResolutionService::new(
            cache,
            Arc::new(DashMapResolutionMetrics::new()),
            Arc::new(ResolutionLogWriter::disabled()),
            fallback,
        )
    }

    fn service() -> ResolutionService {
        service_with(Arc::new(ScriptedSource::new(kuwait())), false)
    }

    fn codes(zones: &[Zone]) -> Vec<&str> {
        zones.iter().map(|z| z.code.as_str()).collect()
    }

    // ===== Resolve Tests =====

    #[test]
    fn test_resolve_kuwait_city() {
        let result = service().resolve(29.3759, 47.9774).unwrap();

        assert_eq!(result.governorate.as_deref(), Some("Al Asimah"));
        assert_eq!(result.district.as_deref(), Some("Kuwait City"));
        assert_eq!(result.block.as_deref(), Some("KC-1"));
        assert_eq!(result.police_zone.as_deref(), Some("Capital Police"));
        assert_eq!(result.status, ResolutionStatus::Resolved);
        assert_eq!(result.snapshot_version, 1);
    }

    #[test]
    fn test_resolve_out_of_bounds() {
        let result = service().resolve(0.0, 0.0).unwrap();

        assert!(result.is_empty());
        assert_eq!(result.status, ResolutionStatus::OutOfBounds);
    }

    #[test]
    fn test_unmapped_district_resolves_without_police_zone() {
        let result = service().resolve(29.355, 47.90).unwrap();

        assert_eq!(result.district.as_deref(), Some("Shuwaikh"));
        assert_eq!(result.governorate.as_deref(), Some("Al Asimah"));
        assert_eq!(result.police_zone, None);
        assert_eq!(result.status, ResolutionStatus::Partial);
    }

    #[test]
    fn test_governorate_fallback_flag() {
        // Inside Al Asimah but outside every district
        let point = (29.27, 47.90);

        let plain = service().resolve(point.0, point.1).unwrap();
        assert_eq!(plain.status, ResolutionStatus::Unresolved);
        assert!(plain.is_empty());

        let fallback = service_with(Arc::new(ScriptedSource::new(kuwait())), true)
            .resolve(point.0, point.1)
            .unwrap();
        assert_eq!(fallback.status, ResolutionStatus::GovernorateOnly);
        assert_eq!(fallback.governorate.as_deref(), Some("Al Asimah"));
        assert_eq!(fallback.district, None);
    }

    #[test]
    fn test_resolve_without_boundaries_fails() {
        let service = service_with(Arc::new(ScriptedSource::failing()), false);
        assert!(service.resolve(29.3759, 47.9774).is_err());
        assert!(service.snapshot_info().is_none());
    }

    #[test]
    fn test_resolve_batch_shares_snapshot() {
        let service = service();
        let results = service
            .resolve_batch(&[
                Coordinate::new(29.3759, 47.9774),
                Coordinate::new(0.0, 0.0),
                Coordinate::new(29.33, 48.15),
            ])
            .unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].district.as_deref(), Some("Kuwait City"));
        assert_eq!(results[1].status, ResolutionStatus::OutOfBounds);
        assert_eq!(results[2].police_zone.as_deref(), Some("Hawalli Police"));
        assert!(results.iter().all(|r| r.snapshot_version == 1));
    }

    #[test]
    fn test_metrics_track_outcomes() {
        let service = service();
        service.resolve(29.3759, 47.9774).unwrap();
        service.resolve(0.0, 0.0).unwrap();
        service.resolve(0.0, 0.0).unwrap();

        let metrics = service.metrics();
        assert_eq!(metrics.resolutions.total, 3);
        assert_eq!(metrics.resolutions.outcomes["out_of_bounds"], 2);
        assert_eq!(metrics.resolutions.outcomes["resolved"], 1);
        assert_eq!(metrics.snapshot_version, 1);
        assert_eq!(metrics.snapshot_loads, 1);
        // Disabled audit log drops every entry without affecting resolution
        assert_eq!(metrics.audit_log.dropped, 3);
    }

    #[tokio::test]
    async fn test_out_of_bounds_is_logged() {
        let cache = Arc::new(BoundaryCache::new(
            Arc::new(ScriptedSource::new(kuwait())),
            Arc::new(RTreeIndexFactory),
            BoundingBox::KUWAIT,
        ));
        let log = Arc::new(SqliteResolutionLog::in_memory().unwrap());
        let (writer, handle) = ResolutionLogWriter::spawn(log.clone(), 16, 8);
        let service = ResolutionService::new(
            cache,
            Arc::new(DashMapResolutionMetrics::new()),
            Arc::new(writer),
            false,
        );

        service.resolve(0.0, 0.0).unwrap();
        service.log_writer().close();
        handle.await.unwrap();

        let entries = log.recent(10).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, ResolutionStatus::OutOfBounds);
        assert_eq!(entries[0].district, None);
        assert_eq!((entries[0].lat, entries[0].lon), (0.0, 0.0));
    }

    // ===== Reload Tests =====

    #[test]
    fn test_reload_bumps_version() {
        let service = service();
        service.resolve(29.3759, 47.9774).unwrap();

        assert_eq!(service.reload().unwrap(), 2);
        assert_eq!(service.resolve(29.3759, 47.9774).unwrap().snapshot_version, 2);
    }

    #[test]
    fn test_invalidate_reloads_on_next_call() {
        let source = Arc::new(ScriptedSource::new(kuwait()));
        let service = service_with(source.clone(), false);
        service.resolve(29.3759, 47.9774).unwrap();

        service.invalidate();
        assert_eq!(source.calls(), 1);
        service.resolve(29.3759, 47.9774).unwrap();
        assert_eq!(source.calls(), 2);
    }

    // ===== Hierarchy Tests =====

    #[test]
    fn test_hierarchy_queries() {
        let service = service();

        let districts = service.districts_in_police_zone("Capital Police").unwrap().unwrap();
        assert_eq!(codes(&districts), vec!["Kuwait City"]);

        let blocks = service.blocks_in_district("Kuwait City").unwrap().unwrap();
        assert_eq!(codes(&blocks), vec!["KC-1", "KC-2"]);

        let districts = service.districts_in_governorate("Al Asimah").unwrap().unwrap();
        assert_eq!(codes(&districts), vec!["Kuwait City", "Shuwaikh"]);

        assert!(service.districts_in_police_zone("Nowhere").unwrap().is_none());
        assert!(service.blocks_in_district("Nowhere").unwrap().is_none());
    }

    #[test]
    fn test_unmapped_districts() {
        let unmapped = service().unmapped_districts().unwrap();
        assert_eq!(codes(&unmapped), vec!["Shuwaikh"]);
    }

    #[test]
    fn test_zone_listing_and_lookup() {
        let service = service();

        let governorates = service.zones(ZoneLevel::Governorate).unwrap();
        assert_eq!(codes(&governorates), vec!["Al Asimah", "Hawalli"]);

        let zone = service.zone(ZoneLevel::Governorate, "Al Asimah").unwrap().unwrap();
        assert_eq!(zone.name_ar.as_deref(), Some("العاصمة"));
        assert!(service.zone(ZoneLevel::Block, "KC-9").unwrap().is_none());
    }

    #[test]
    fn test_snapshot_info() {
        let service = service();
        assert!(service.snapshot_info().is_none());

        service.resolve(29.3759, 47.9774).unwrap();
        let info = service.snapshot_info().unwrap();

        assert_eq!(info.version, 1);
        assert_eq!(info.index, "rtree");
        assert_eq!(info.counts["districts"], 3);
        assert_eq!(info.counts["blocks"], 2);
        assert_eq!(info.unmapped_districts, 1);
        assert_eq!(info.membership_conflicts, 0);
    }
}
