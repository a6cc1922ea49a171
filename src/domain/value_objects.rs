//! Value Objects - Immutable domain primitives
//!
//! Value objects are identified by their value rather than identity.
//! They are immutable and can be freely shared.

use geo::Point;
use serde::{Deserialize, Serialize};

/// Level of the administrative hierarchy a zone belongs to.
///
/// The hierarchy is fixed: governorate → district → block, with police
/// zones covering sets of districts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneLevel {
    Governorate,
    District,
    Block,
    PoliceZone,
}

impl ZoneLevel {
    /// All levels in hierarchy order.
    pub const ALL: [ZoneLevel; 4] = [
        ZoneLevel::Governorate,
        ZoneLevel::District,
        ZoneLevel::Block,
        ZoneLevel::PoliceZone,
    ];

    /// Parse a level from a string.
    ///
    /// Accepts the snake_case form as well as the plural used in URLs
    /// and file names (`districts`, `police_zones`, `police-zones`).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "governorate" | "governorates" => Some(Self::Governorate),
            "district" | "districts" => Some(Self::District),
            "block" | "blocks" => Some(Self::Block),
            "police_zone" | "police_zones" => Some(Self::PoliceZone),
            _ => None,
        }
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Governorate => "governorate",
            Self::District => "district",
            Self::Block => "block",
            Self::PoliceZone => "police_zone",
        }
    }

    /// Plural form, used for boundary file names.
    pub fn plural(&self) -> &'static str {
        match self {
            Self::Governorate => "governorates",
            Self::District => "districts",
            Self::Block => "blocks",
            Self::PoliceZone => "police_zones",
        }
    }

    /// Whether features at this level carry an area (polygon) geometry.
    ///
    /// Blocks are approximated by a centroid point instead.
    pub fn has_area(&self) -> bool {
        !matches!(self, Self::Block)
    }
}

impl std::fmt::Display for ZoneLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A WGS84 coordinate as received from incident records.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Both components are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lon.is_finite()
    }

    /// Geometry point in GeoJSON axis order (x = lon, y = lat).
    pub fn to_point(&self) -> Point<f64> {
        Point::new(self.lon, self.lat)
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lon)
    }
}

/// Plausibility box of the covered jurisdiction.
///
/// Coordinates outside the box are never tested against polygons.
/// Edges are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    /// Kuwait, with a small margin around the land border and islands.
    pub const KUWAIT: BoundingBox = BoundingBox {
        min_lat: 28.5,
        min_lon: 46.5,
        max_lat: 30.2,
        max_lon: 48.6,
    };

    pub fn new(min_lat: f64, min_lon: f64, max_lat: f64, max_lon: f64) -> Option<Self> {
        let all_finite = [min_lat, min_lon, max_lat, max_lon]
            .iter()
            .all(|v| v.is_finite());
        if !all_finite || min_lat > max_lat || min_lon > max_lon {
            return None;
        }
        Some(Self {
            min_lat,
            min_lon,
            max_lat,
            max_lon,
        })
    }

    /// Parse `min_lat,min_lon,max_lat,max_lon`.
    pub fn parse(s: &str) -> Option<Self> {
        let parts: Vec<f64> = s
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .ok()?;
        match parts.as_slice() {
            [min_lat, min_lon, max_lat, max_lon] => {
                Self::new(*min_lat, *min_lon, *max_lat, *max_lon)
            }
            _ => None,
        }
    }

    /// Whether the coordinate lies inside the box.
    ///
    /// Non-finite coordinates are never inside.
    pub fn contains(&self, coord: &Coordinate) -> bool {
        coord.is_finite()
            && coord.lat >= self.min_lat
            && coord.lat <= self.max_lat
            && coord.lon >= self.min_lon
            && coord.lon <= self.max_lon
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::KUWAIT
    }
}

/// Outcome tag attached to every resolution.
///
/// None of these are errors: every tag is a valid result that callers
/// may skip, flag or fall back on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    /// District, governorate, block and police zone all found.
    Resolved,
    /// District found, at least one other field null.
    Partial,
    /// No district contained the point; governorate found by fallback.
    GovernorateOnly,
    /// Inside the bounding box but outside every modeled district.
    Unresolved,
    /// Outside the bounding box, or not a finite coordinate.
    OutOfBounds,
}

impl ResolutionStatus {
    pub const ALL: [ResolutionStatus; 5] = [
        ResolutionStatus::Resolved,
        ResolutionStatus::Partial,
        ResolutionStatus::GovernorateOnly,
        ResolutionStatus::Unresolved,
        ResolutionStatus::OutOfBounds,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resolved => "resolved",
            Self::Partial => "partial",
            Self::GovernorateOnly => "governorate_only",
            Self::Unresolved => "unresolved",
            Self::OutOfBounds => "out_of_bounds",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }
}

impl std::fmt::Display for ResolutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
