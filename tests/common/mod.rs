//! Shared fixtures: a small Kuwait boundary set written as GeoJSON files
//! into a temporary directory.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use zone_resolver::adapters::outbound::{DashMapResolutionMetrics, GeoJsonBoundarySource, RTreeIndexFactory};
use zone_resolver::application::{BoundaryCache, ResolutionLogWriter, ResolutionService};
use zone_resolver::domain::ports::SpatialIndexFactory;
use zone_resolver::BoundingBox;

/// Point inside the Kuwait City district polygon.
pub const KUWAIT_CITY: (f64, f64) = (29.3759, 47.9774);
/// Point inside Shuwaikh, a district no police zone covers.
pub const SHUWAIKH: (f64, f64) = (29.355, 47.895);
/// Point inside Salmiya.
pub const SALMIYA: (f64, f64) = (29.33, 48.15);

/// Polygon geometry for a lon/lat rectangle.
pub fn rect(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Value {
    json!({
        "type": "Polygon",
        "coordinates": [[
            [min_lon, min_lat],
            [max_lon, min_lat],
            [max_lon, max_lat],
            [min_lon, max_lat],
            [min_lon, min_lat]
        ]]
    })
}

pub fn point(lat: f64, lon: f64) -> Value {
    json!({ "type": "Point", "coordinates": [lon, lat] })
}

pub fn feature(properties: Value, geometry: Value) -> Value {
    json!({ "type": "Feature", "properties": properties, "geometry": geometry })
}

pub fn collection(features: Vec<Value>) -> String {
    json!({ "type": "FeatureCollection", "features": features }).to_string()
}

/// Codes that differ between two otherwise identical boundary sets.
#[derive(Debug, Clone, Copy)]
pub struct Naming {
    pub capital: &'static str,
    pub capital_police: &'static str,
}

pub const ORIGINAL: Naming = Naming {
    capital: "Al Asimah",
    capital_police: "Capital Police",
};

pub const RENAMED: Naming = Naming {
    capital: "Capital Governorate",
    capital_police: "Central Police",
};

pub fn write_level(dir: &Path, file: &str, features: Vec<Value>) {
    std::fs::write(dir.join(file), collection(features)).unwrap();
}

/// Write all four level files.
pub fn write_kuwait(dir: &Path, naming: Naming) {
    write_level(
        dir,
        "governorates.geojson",
        vec![
            feature(
                json!({ "code": naming.capital, "name_en": naming.capital, "name_ar": "العاصمة", "population": 600000 }),
                rect(47.85, 29.25, 48.10, 29.45),
            ),
            feature(
                json!({ "code": "Hawalli", "name_en": "Hawalli" }),
                rect(48.10, 29.25, 48.20, 29.40),
            ),
        ],
    );

    write_level(
        dir,
        "districts.geojson",
        vec![
            feature(
                json!({ "code": "Kuwait City", "governorate": naming.capital }),
                rect(47.93, 29.33, 48.02, 29.40),
            ),
            feature(
                json!({ "code": "Shuwaikh", "governorate": naming.capital }),
                rect(47.86, 29.33, 47.93, 29.38),
            ),
            feature(
                json!({ "code": "Salmiya", "governorate": "Hawalli" }),
                rect(48.10, 29.30, 48.20, 29.36),
            ),
        ],
    );

    write_level(
        dir,
        "blocks.geojson",
        vec![
            feature(json!({ "code": "KC-1", "district": "Kuwait City" }), point(29.372, 47.975)),
            feature(json!({ "code": "KC-2", "district": "Kuwait City" }), point(29.350, 48.000)),
            feature(json!({ "code": "SHW-1", "district": "Shuwaikh" }), point(29.355, 47.900)),
            // Polygon blocks are reduced to their centroid (48.15, 29.33)
            feature(
                json!({ "code": "SAL-1", "district": "Salmiya" }),
                rect(48.14, 29.32, 48.16, 29.34),
            ),
        ],
    );

    write_level(
        dir,
        "police_zones.geojson",
        vec![
            feature(
                json!({ "code": naming.capital_police, "districts": ["Kuwait City"] }),
                rect(47.85, 29.25, 48.10, 29.45),
            ),
            feature(
                json!({ "code": "Hawalli Police", "districts": ["Salmiya"] }),
                rect(48.10, 29.25, 48.20, 29.40),
            ),
        ],
    );
}

pub struct Fixture {
    pub dir: TempDir,
}

impl Fixture {
    pub fn kuwait() -> Self {
        let dir = TempDir::new().unwrap();
        write_kuwait(dir.path(), ORIGINAL);
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn source(&self) -> Arc<GeoJsonBoundarySource> {
        Arc::new(GeoJsonBoundarySource::new(self.path()))
    }

    pub fn cache_with(&self, factory: Arc<dyn SpatialIndexFactory>) -> Arc<BoundaryCache> {
        Arc::new(BoundaryCache::new(self.source(), factory, BoundingBox::KUWAIT))
    }

    pub fn cache(&self) -> Arc<BoundaryCache> {
        self.cache_with(Arc::new(RTreeIndexFactory))
    }

    /// Service with the audit log disabled.
    pub fn service(&self) -> Arc<ResolutionService> {
        Arc::new(ResolutionService::new(
            self.cache(),
            Arc::new(DashMapResolutionMetrics::new()),
            Arc::new(ResolutionLogWriter::disabled()),
            false,
        ))
    }
}
