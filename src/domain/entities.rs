//! Domain Entities - Core business objects
//!
//! These entities represent the administrative hierarchy and the
//! outcome of mapping a coordinate onto it.

use crate::domain::value_objects::{Coordinate, ResolutionStatus, ZoneLevel};
use geo::{MultiPolygon, Point};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A member of the administrative hierarchy.
///
/// All four levels share this one shape; `level` tells them apart.
/// Geometry is kept apart from the zone (see [`BoundaryFeature`]) so
/// zones can be cloned and serialized cheaply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    /// Unique code within the level
    pub code: String,
    pub level: ZoneLevel,
    /// English display name
    pub name_en: String,
    /// Arabic display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_ar: Option<String>,
    /// Administrative parent: the governorate of a district, the district
    /// of a block. Always `None` for governorates and police zones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// District codes covered by a police zone, in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub covers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub population: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_km2: Option<f64>,
}

impl Zone {
    /// Create a zone with only the required fields set.
    pub fn new(level: ZoneLevel, code: impl Into<String>, name_en: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            level,
            name_en: name_en.into(),
            name_ar: None,
            parent: None,
            covers: Vec::new(),
            population: None,
            area_km2: None,
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_name_ar(mut self, name_ar: impl Into<String>) -> Self {
        self.name_ar = Some(name_ar.into());
        self
    }

    pub fn with_covers<I, S>(mut self, districts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.covers = districts.into_iter().map(Into::into).collect();
        self
    }
}

/// Geometry attached to a zone.
#[derive(Debug, Clone, PartialEq)]
pub enum ZoneGeometry {
    /// Polygon boundary, possibly multi-part
    Area(MultiPolygon<f64>),
    /// Representative point (block centroids)
    Centroid(Point<f64>),
}

impl ZoneGeometry {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Area(_) => "polygon",
            Self::Centroid(_) => "point",
        }
    }
}

/// A zone together with its geometry, as read from a boundary source.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryFeature {
    pub zone: Zone,
    pub geometry: ZoneGeometry,
}

impl BoundaryFeature {
    pub fn new(zone: Zone, geometry: ZoneGeometry) -> Self {
        Self { zone, geometry }
    }
}

/// Raw boundary definitions for all four levels, in source order.
///
/// Source order matters: it is the deterministic tie-break order when
/// polygons overlap.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundaryDataset {
    pub governorates: Vec<BoundaryFeature>,
    pub districts: Vec<BoundaryFeature>,
    pub blocks: Vec<BoundaryFeature>,
    pub police_zones: Vec<BoundaryFeature>,
}

impl BoundaryDataset {
    /// Total number of features across levels.
    pub fn len(&self) -> usize {
        self.governorates.len() + self.districts.len() + self.blocks.len() + self.police_zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of resolving one coordinate.
///
/// Every zone field is independently nullable; a result with all fields
/// null is valid and describes a point outside modeled coverage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionResult {
    pub governorate: Option<String>,
    pub district: Option<String>,
    pub block: Option<String>,
    pub police_zone: Option<String>,
    pub status: ResolutionStatus,
    /// Haversine distance from the input to the chosen block centroid
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_distance_m: Option<f64>,
    /// Version of the boundary snapshot that produced this result
    pub snapshot_version: u64,
}

impl ResolutionResult {
    /// All-null result for a coordinate outside the covered region.
    pub fn out_of_bounds(snapshot_version: u64) -> Self {
        Self::empty(ResolutionStatus::OutOfBounds, snapshot_version)
    }

    /// All-null result for a coordinate inside the region but outside
    /// every modeled district.
    pub fn unresolved(snapshot_version: u64) -> Self {
        Self::empty(ResolutionStatus::Unresolved, snapshot_version)
    }

    fn empty(status: ResolutionStatus, snapshot_version: u64) -> Self {
        Self {
            governorate: None,
            district: None,
            block: None,
            police_zone: None,
            status,
            block_distance_m: None,
            snapshot_version,
        }
    }

    /// Whether every zone field is null.
    pub fn is_empty(&self) -> bool {
        self.governorate.is_none()
            && self.district.is_none()
            && self.block.is_none()
            && self.police_zone.is_none()
    }
}

/// Immutable audit record of one resolution attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionLogEntry {
    /// Wall-clock time the resolution finished (ms since Unix epoch)
    pub recorded_at_ms: u64,
    pub lat: f64,
    pub lon: f64,
    /// Outcome tag; doubles as the failure reason for null results
    pub status: ResolutionStatus,
    pub governorate: Option<String>,
    pub district: Option<String>,
    pub block: Option<String>,
    pub police_zone: Option<String>,
    /// Time spent resolving, in microseconds
    pub duration_us: u64,
    pub snapshot_version: u64,
}

impl ResolutionLogEntry {
    /// Build an entry from a finished resolution.
    pub fn new(coord: Coordinate, result: &ResolutionResult, duration: Duration) -> Self {
        let recorded_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        Self {
            recorded_at_ms,
            lat: coord.lat,
            lon: coord.lon,
            status: result.status,
            governorate: result.governorate.clone(),
            district: result.district.clone(),
            block: result.block.clone(),
            police_zone: result.police_zone.clone(),
            duration_us: duration.as_micros().min(u64::MAX as u128) as u64,
            snapshot_version: result.snapshot_version,
        }
    }
}
