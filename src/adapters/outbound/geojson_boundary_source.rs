//! GeoJSON Boundary Source
//!
//! Implements BoundarySource by reading one FeatureCollection file per
//! hierarchy level from a directory:
//!
//! - `governorates.geojson` - polygons, optional `population`, `area_km2`
//! - `districts.geojson` - polygons with a `governorate` code
//! - `blocks.geojson` - points (polygons are reduced to their centroid)
//!   with a `district` code
//! - `police_zones.geojson` - polygons with a `districts` code array
//!
//! Every feature needs a `code` property (or a feature id) and a geometry.

use crate::domain::entities::{BoundaryDataset, BoundaryFeature, Zone, ZoneGeometry};
use crate::domain::error::BoundaryLoadError;
use crate::domain::ports::BoundarySource;
use crate::domain::value_objects::ZoneLevel;
use geo::{Centroid, MultiPolygon};
use geojson::{feature::Id, Feature, GeoJson};
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};

/// Directory of per-level GeoJSON files.
#[derive(Debug, Clone)]
pub struct GeoJsonBoundarySource {
    dir: PathBuf,
}

impl GeoJsonBoundarySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the features of `level`.
    pub fn file_for(&self, level: ZoneLevel) -> PathBuf {
        self.dir.join(format!("{}.geojson", level.plural()))
    }

    /// All files this source reads, in hierarchy order.
    pub fn files(&self) -> Vec<PathBuf> {
        ZoneLevel::ALL.iter().map(|&level| self.file_for(level)).collect()
    }

    fn read_level(&self, level: ZoneLevel) -> Result<Vec<BoundaryFeature>, BoundaryLoadError> {
        let path = self.file_for(level);
        let text = std::fs::read_to_string(&path).map_err(|e| BoundaryLoadError::Io {
            level,
            path: path.clone(),
            reason: e.to_string(),
        })?;
        parse_collection(level, &text)
    }
}

impl BoundarySource for GeoJsonBoundarySource {
    fn describe(&self) -> String {
        self.dir.display().to_string()
    }

    fn load(&self) -> Result<BoundaryDataset, BoundaryLoadError> {
        Ok(BoundaryDataset {
            governorates: self.read_level(ZoneLevel::Governorate)?,
            districts: self.read_level(ZoneLevel::District)?,
            blocks: self.read_level(ZoneLevel::Block)?,
            police_zones: self.read_level(ZoneLevel::PoliceZone)?,
        })
    }
}

/// Parse one level's FeatureCollection, preserving feature order.
pub fn parse_collection(
    level: ZoneLevel,
    text: &str,
) -> Result<Vec<BoundaryFeature>, BoundaryLoadError> {
    let geojson: GeoJson = text.parse().map_err(|e: geojson::Error| BoundaryLoadError::Malformed {
        level,
        reason: e.to_string(),
    })?;

    let GeoJson::FeatureCollection(collection) = geojson else {
        return Err(BoundaryLoadError::Malformed {
            level,
            reason: "expected a FeatureCollection".to_string(),
        });
    };

    collection
        .features
        .into_iter()
        .enumerate()
        .map(|(index, feature)| feature_to_boundary(level, index, feature))
        .collect()
}

/// Convert a GeoJSON feature to a domain feature.
fn feature_to_boundary(
    level: ZoneLevel,
    index: usize,
    feature: Feature,
) -> Result<BoundaryFeature, BoundaryLoadError> {
    let code = feature_code(&feature).ok_or(BoundaryLoadError::MissingCode { level, index })?;

    let mut zone = Zone::new(
        level,
        code.clone(),
        string_property(&feature, "name_en")
            .or_else(|| string_property(&feature, "name"))
            .unwrap_or_else(|| code.clone()),
    );
    zone.name_ar = string_property(&feature, "name_ar");
    zone.population = feature.property("population").and_then(JsonValue::as_u64);
    zone.area_km2 = feature.property("area_km2").and_then(JsonValue::as_f64);

    match level {
        ZoneLevel::District => zone.parent = string_property(&feature, "governorate"),
        ZoneLevel::Block => zone.parent = string_property(&feature, "district"),
        ZoneLevel::PoliceZone => zone.covers = covered_districts(level, &code, &feature)?,
        ZoneLevel::Governorate => {}
    }

    let geometry = feature
        .geometry
        .ok_or_else(|| BoundaryLoadError::MissingGeometry {
            level,
            code: code.clone(),
        })?;
    let geometry = geo::Geometry::<f64>::try_from(geometry).map_err(|e| {
        BoundaryLoadError::Malformed {
            level,
            reason: format!("{}: {}", code, e),
        }
    })?;

    Ok(BoundaryFeature::new(zone, convert_geometry(level, &code, geometry)?))
}

fn feature_code(feature: &Feature) -> Option<String> {
    let from_property = match feature.property("code") {
        Some(JsonValue::String(s)) => Some(s.trim().to_string()),
        Some(JsonValue::Number(n)) => Some(n.to_string()),
        _ => None,
    };
    let from_id = || match &feature.id {
        Some(Id::String(s)) => Some(s.trim().to_string()),
        Some(Id::Number(n)) => Some(n.to_string()),
        None => None,
    };
    from_property.or_else(from_id).filter(|code| !code.is_empty())
}

fn string_property(feature: &Feature, key: &str) -> Option<String> {
    feature
        .property(key)
        .and_then(JsonValue::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn covered_districts(
    level: ZoneLevel,
    code: &str,
    feature: &Feature,
) -> Result<Vec<String>, BoundaryLoadError> {
    match feature.property("districts") {
        None | Some(JsonValue::Null) => Ok(Vec::new()),
        Some(JsonValue::Array(items)) => items
            .iter()
            .map(|item| match item {
                JsonValue::String(s) => Ok(s.trim().to_string()),
                JsonValue::Number(n) => Ok(n.to_string()),
                other => Err(BoundaryLoadError::Malformed {
                    level,
                    reason: format!("{}: district code must be a string, got {}", code, other),
                }),
            })
            .collect(),
        Some(other) => Err(BoundaryLoadError::Malformed {
            level,
            reason: format!("{}: districts must be an array, got {}", code, other),
        }),
    }
}

fn convert_geometry(
    level: ZoneLevel,
    code: &str,
    geometry: geo::Geometry<f64>,
) -> Result<ZoneGeometry, BoundaryLoadError> {
    let unsupported = |found: &geo::Geometry<f64>| BoundaryLoadError::UnsupportedGeometry {
        level,
        code: code.to_string(),
        expected: if level.has_area() { "polygon" } else { "point" },
        found: geometry_name(found).to_string(),
    };

    let converted = match (level.has_area(), &geometry) {
        (true, geo::Geometry::Polygon(polygon)) => {
            Some(ZoneGeometry::Area(MultiPolygon(vec![polygon.clone()])))
        }
        (true, geo::Geometry::MultiPolygon(multi)) => Some(ZoneGeometry::Area(multi.clone())),
        (false, geo::Geometry::Point(point)) => Some(ZoneGeometry::Centroid(*point)),
        // Block outlines are approximated by their centroid.
        (false, geo::Geometry::Polygon(polygon)) => polygon.centroid().map(ZoneGeometry::Centroid),
        (false, geo::Geometry::MultiPolygon(multi)) => multi.centroid().map(ZoneGeometry::Centroid),
        _ => None,
    };

    converted.ok_or_else(|| unsupported(&geometry))
}

fn geometry_name(geometry: &geo::Geometry<f64>) -> &'static str {
    match geometry {
        geo::Geometry::Point(_) => "Point",
        geo::Geometry::Line(_) => "Line",
        geo::Geometry::LineString(_) => "LineString",
        geo::Geometry::Polygon(_) => "Polygon",
        geo::Geometry::MultiPoint(_) => "MultiPoint",
        geo::Geometry::MultiLineString(_) => "MultiLineString",
        geo::Geometry::MultiPolygon(_) => "MultiPolygon",
        geo::Geometry::GeometryCollection(_) => "GeometryCollection",
        geo::Geometry::Rect(_) => "Rect",
        geo::Geometry::Triangle(_) => "Triangle",
    }
}
