//! Integration tests for coordinate resolution against GeoJSON boundaries.

mod common;

use common::*;
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use zone_resolver::adapters::outbound::{
    DashMapResolutionMetrics, EnvelopeScanIndexFactory, GeoJsonBoundarySource, RTreeIndexFactory,
    SqliteResolutionLog,
};
use zone_resolver::application::{BoundaryCache, ResolutionLogWriter, ResolutionService};
use zone_resolver::domain::ports::SpatialIndexFactory;
use zone_resolver::{
    BoundaryDataset, BoundaryLoadError, BoundarySource, BoundingBox, Coordinate, ResolutionStatus,
    ZoneLevel,
};

// ===== Concrete Scenarios =====

#[test]
fn test_kuwait_city_resolves_full_hierarchy() {
    let fixture = Fixture::kuwait();
    let result = fixture.service().resolve(KUWAIT_CITY.0, KUWAIT_CITY.1).unwrap();

    assert_eq!(result.governorate.as_deref(), Some("Al Asimah"));
    assert_eq!(result.district.as_deref(), Some("Kuwait City"));
    assert_eq!(result.block.as_deref(), Some("KC-1"));
    assert_eq!(result.police_zone.as_deref(), Some("Capital Police"));
    assert_eq!(result.status, ResolutionStatus::Resolved);

    // ~490 m between the input and the KC-1 centroid
    let distance = result.block_distance_m.unwrap();
    assert!(distance > 300.0 && distance < 800.0, "{}", distance);
}

#[tokio::test]
async fn test_out_of_bounds_resolves_null_and_is_logged() {
    let fixture = Fixture::kuwait();
    let log_path = fixture.path().join("resolution_log.db");
    let log = Arc::new(SqliteResolutionLog::open(&log_path).unwrap());
    let (writer, task) = ResolutionLogWriter::spawn(log.clone(), 100, 10);
    let service = ResolutionService::new(
        fixture.cache(),
        Arc::new(DashMapResolutionMetrics::new()),
        Arc::new(writer),
        false,
    );

    let result = service.resolve(0.0, 0.0).unwrap();
    assert!(result.is_empty());
    assert_eq!(result.status, ResolutionStatus::OutOfBounds);

    service.resolve(KUWAIT_CITY.0, KUWAIT_CITY.1).unwrap();
    service.log_writer().close();
    task.await.unwrap();

    assert_eq!(log.count(Some(ResolutionStatus::OutOfBounds)).unwrap(), 1);
    assert_eq!(log.count(None).unwrap(), 2);
    let entries = log.recent(10).unwrap();
    let oob = &entries[1];
    assert_eq!(oob.status, ResolutionStatus::OutOfBounds);
    assert_eq!((oob.lat, oob.lon), (0.0, 0.0));
    assert!(oob.governorate.is_none() && oob.district.is_none());
    assert_eq!(entries[0].district.as_deref(), Some("Kuwait City"));
}

#[test]
fn test_district_without_police_zone() {
    let fixture = Fixture::kuwait();
    let result = fixture.service().resolve(SHUWAIKH.0, SHUWAIKH.1).unwrap();

    assert_eq!(result.district.as_deref(), Some("Shuwaikh"));
    assert_eq!(result.governorate.as_deref(), Some("Al Asimah"));
    assert_eq!(result.block.as_deref(), Some("SHW-1"));
    assert_eq!(result.police_zone, None);
    assert_eq!(result.status, ResolutionStatus::Partial);
}

#[test]
fn test_polygon_block_reduced_to_centroid() {
    let fixture = Fixture::kuwait();
    let result = fixture.service().resolve(SALMIYA.0, SALMIYA.1).unwrap();

    assert_eq!(result.block.as_deref(), Some("SAL-1"));
    assert_eq!(result.police_zone.as_deref(), Some("Hawalli Police"));
    assert!(result.block_distance_m.unwrap() < 1.0);
}

#[test]
fn test_every_point_in_district_resolves_to_it() {
    let fixture = Fixture::kuwait();
    let service = fixture.service();

    // Grid strictly inside Kuwait City (47.93..48.02, 29.33..29.40)
    for i in 1..10 {
        for j in 1..7 {
            let lon = 47.93 + i as f64 * 0.009;
            let lat = 29.33 + j as f64 * 0.01;
            let result = service.resolve(lat, lon).unwrap();
            assert_eq!(result.district.as_deref(), Some("Kuwait City"), "({}, {})", lat, lon);
            assert_eq!(result.governorate.as_deref(), Some("Al Asimah"));
        }
    }
}

#[test]
fn test_points_outside_box_never_fail() {
    let fixture = Fixture::kuwait();
    let service = fixture.service();
    for (lat, lon) in [(0.0, 0.0), (-90.0, 180.0), (51.5, -0.12), (29.3, 50.0), (f64::NAN, 47.9)] {
        let result = service.resolve(lat, lon).unwrap();
        assert_eq!(result.status, ResolutionStatus::OutOfBounds);
        assert!(result.is_empty());
    }
}

#[test]
fn test_scan_index_matches_rtree() {
    let fixture = Fixture::kuwait();
    let build = |factory: Arc<dyn SpatialIndexFactory>| {
        ResolutionService::new(
            fixture.cache_with(factory),
            Arc::new(DashMapResolutionMetrics::new()),
            Arc::new(ResolutionLogWriter::disabled()),
            false,
        )
    };
    let tree = build(Arc::new(RTreeIndexFactory));
    let scan = build(Arc::new(EnvelopeScanIndexFactory));

    let coords: Vec<Coordinate> = (0..30)
        .flat_map(|i| (0..20).map(move |j| Coordinate::new(29.24 + j as f64 * 0.011, 47.84 + i as f64 * 0.0125)))
        .collect();

    assert_eq!(tree.resolve_batch(&coords).unwrap(), scan.resolve_batch(&coords).unwrap());
}

// ===== Hierarchy =====

#[test]
fn test_blocks_in_district_is_exact_membership() {
    let fixture = Fixture::kuwait();
    let service = fixture.service();

    let blocks = service.blocks_in_district("Kuwait City").unwrap().unwrap();
    assert_eq!(blocks.len(), 2);
    assert!(blocks
        .iter()
        .all(|b| b.level == ZoneLevel::Block && b.parent.as_deref() == Some("Kuwait City")));

    // Idempotent on the same snapshot
    assert_eq!(service.blocks_in_district("Kuwait City").unwrap().unwrap(), blocks);
}

#[test]
fn test_districts_in_police_zone_is_exact_membership() {
    let fixture = Fixture::kuwait();
    let service = fixture.service();

    let districts = service.districts_in_police_zone("Hawalli Police").unwrap().unwrap();
    let codes: Vec<&str> = districts.iter().map(|d| d.code.as_str()).collect();
    assert_eq!(codes, vec!["Salmiya"]);

    let unmapped = service.unmapped_districts().unwrap();
    assert_eq!(unmapped.len(), 1);
    assert_eq!(unmapped[0].code, "Shuwaikh");
}

#[test]
fn test_zone_properties_loaded() {
    let fixture = Fixture::kuwait();
    let service = fixture.service();
    let capital = service.zone(ZoneLevel::Governorate, "Al Asimah").unwrap().unwrap();

    assert_eq!(capital.name_ar.as_deref(), Some("العاصمة"));
    assert_eq!(capital.population, Some(600000));
    assert_eq!(service.zones(ZoneLevel::Block).unwrap().len(), 4);
}

// ===== Load Failures =====

#[test]
fn test_missing_file_is_io_error() {
    let fixture = Fixture::kuwait();
    std::fs::remove_file(fixture.path().join("blocks.geojson")).unwrap();

    let err = fixture.source().load().unwrap_err();
    assert!(matches!(err, BoundaryLoadError::Io { level: ZoneLevel::Block, .. }));
}

#[test]
fn test_feature_without_code_fails_load() {
    let fixture = Fixture::kuwait();
    write_level(
        fixture.path(),
        "districts.geojson",
        vec![feature(json!({ "governorate": "Al Asimah" }), rect(47.9, 29.3, 48.0, 29.4))],
    );

    let err = fixture.service().resolve(KUWAIT_CITY.0, KUWAIT_CITY.1).unwrap_err();
    assert!(matches!(err, BoundaryLoadError::MissingCode { level: ZoneLevel::District, index: 0 }));
}

#[test]
fn test_feature_without_geometry_fails_load() {
    let fixture = Fixture::kuwait();
    std::fs::write(
        fixture.path().join("governorates.geojson"),
        json!({
            "type": "FeatureCollection",
            "features": [{ "type": "Feature", "properties": { "code": "Al Asimah" }, "geometry": null }]
        })
        .to_string(),
    )
    .unwrap();

    let err = fixture.source().load().unwrap_err();
    assert!(matches!(err, BoundaryLoadError::MissingGeometry { level: ZoneLevel::Governorate, .. }));
}

// ===== Snapshot Lifecycle =====

/// Wraps a source and counts loads.
struct CountingSource {
    inner: GeoJsonBoundarySource,
    loads: AtomicUsize,
}

impl BoundarySource for CountingSource {
    fn describe(&self) -> String {
        self.inner.describe()
    }

    fn load(&self) -> Result<BoundaryDataset, BoundaryLoadError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.inner.load()
    }
}

#[test]
fn test_concurrent_first_use_loads_once() {
    let fixture = Fixture::kuwait();
    let source = Arc::new(CountingSource {
        inner: GeoJsonBoundarySource::new(fixture.path()),
        loads: AtomicUsize::new(0),
    });
    let cache = Arc::new(BoundaryCache::new(
        source.clone(),
        Arc::new(RTreeIndexFactory),
        BoundingBox::KUWAIT,
    ));
    let service = Arc::new(ResolutionService::new(
        cache,
        Arc::new(DashMapResolutionMetrics::new()),
        Arc::new(ResolutionLogWriter::disabled()),
        false,
    ));

    let barrier = Arc::new(Barrier::new(16));
    let handles: Vec<_> = (0..16)
        .map(|_| {
            let service = service.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                service.resolve(KUWAIT_CITY.0, KUWAIT_CITY.1).unwrap()
            })
        })
        .collect();

    for handle in handles {
        let result = handle.join().unwrap();
        assert_eq!(result.snapshot_version, 1);
        assert_eq!(result.district.as_deref(), Some("Kuwait City"));
    }
    assert_eq!(source.loads.load(Ordering::SeqCst), 1);
}

#[test]
fn test_reload_is_atomic_for_concurrent_resolvers() {
    let fixture = Fixture::kuwait();
    let service = fixture.service();
    service.resolve(KUWAIT_CITY.0, KUWAIT_CITY.1).unwrap();

    let stop = Arc::new(AtomicBool::new(false));
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let service = service.clone();
            let stop = stop.clone();
            thread::spawn(move || {
                let mut seen = 0usize;
                while !stop.load(Ordering::Relaxed) {
                    let r = service.resolve(KUWAIT_CITY.0, KUWAIT_CITY.1).unwrap();
                    let pair = (r.governorate.as_deref(), r.police_zone.as_deref());
                    let consistent = pair == (Some(ORIGINAL.capital), Some(ORIGINAL.capital_police))
                        || pair == (Some(RENAMED.capital), Some(RENAMED.capital_police));
                    assert!(consistent, "mixed snapshot: {:?}", r);
                    seen += 1;
                }
                seen
            })
        })
        .collect();

    for round in 0..10 {
        let naming = if round % 2 == 0 { RENAMED } else { ORIGINAL };
        write_kuwait(fixture.path(), naming);
        service.reload().unwrap();
    }
    stop.store(true, Ordering::Relaxed);

    for reader in readers {
        assert!(reader.join().unwrap() > 0);
    }
    assert_eq!(service.metrics().snapshot_version, 11);
}

#[test]
fn test_failed_reload_keeps_serving() {
    let fixture = Fixture::kuwait();
    let service = fixture.service();
    service.resolve(KUWAIT_CITY.0, KUWAIT_CITY.1).unwrap();

    std::fs::write(fixture.path().join("districts.geojson"), "not json").unwrap();
    let err = service.reload().unwrap_err();
    assert!(matches!(err, BoundaryLoadError::Malformed { level: ZoneLevel::District, .. }));

    let result = service.resolve(KUWAIT_CITY.0, KUWAIT_CITY.1).unwrap();
    assert_eq!(result.district.as_deref(), Some("Kuwait City"));
    assert_eq!(result.snapshot_version, 1);
}

#[test]
fn test_invalidate_picks_up_new_files() {
    let fixture = Fixture::kuwait();
    let service = fixture.service();
    service.resolve(KUWAIT_CITY.0, KUWAIT_CITY.1).unwrap();

    write_kuwait(fixture.path(), RENAMED);
    // Still the old snapshot until invalidated
    let before = service.resolve(KUWAIT_CITY.0, KUWAIT_CITY.1).unwrap();
    assert_eq!(before.governorate.as_deref(), Some(ORIGINAL.capital));

    service.invalidate();
    let after = service.resolve(KUWAIT_CITY.0, KUWAIT_CITY.1).unwrap();
    assert_eq!(after.governorate.as_deref(), Some(RENAMED.capital));
    assert_eq!(after.police_zone.as_deref(), Some(RENAMED.capital_police));
    assert_eq!(after.snapshot_version, 2);
}
