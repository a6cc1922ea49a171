//! Boundary Store
//!
//! Turns a raw [`BoundaryDataset`] into a validated, indexed, read-only
//! snapshot. All preprocessing happens here, once per load.
//!
//! Police zones are assigned purely by the district codes each zone
//! covers. Their polygons are checked at load (a police zone without an
//! area is rejected) but not kept: no lookup tests containment against
//! them.

use crate::domain::entities::{BoundaryDataset, BoundaryFeature, Zone, ZoneGeometry};
use crate::domain::error::BoundaryLoadError;
use crate::domain::ports::{CentroidIndex, PolygonIndex, SpatialIndexFactory};
use crate::domain::value_objects::{BoundingBox, ZoneLevel};
use geo::{MultiPolygon, Point};
use std::collections::HashMap;
use std::time::SystemTime;

/// A district claimed by more than one police zone.
///
/// The first zone in load order wins; the rest are listed for auditing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipConflict {
    pub district: String,
    /// Claiming police zone codes, winner first
    pub police_zones: Vec<String>,
}

/// Blocks of one district, sorted by code, with their centroid index.
struct DistrictBlocks {
    /// Slots into `BoundarySnapshot::blocks`, ordered by block code
    slots: Vec<usize>,
    centroids: Vec<Point<f64>>,
    index: Box<dyn CentroidIndex>,
}

/// One level's zones with a code lookup.
struct Level {
    zones: Vec<Zone>,
    by_code: HashMap<String, usize>,
}

impl Level {
    fn get(&self, code: &str) -> Option<&Zone> {
        self.by_code.get(code).map(|&slot| &self.zones[slot])
    }
}

/// Fully loaded, read-only boundary snapshot.
///
/// Shared between resolver threads behind an `Arc`; never mutated after
/// [`BoundarySnapshot::build`] returns. Reload replaces the whole value.
pub struct BoundarySnapshot {
    version: u64,
    loaded_at: SystemTime,
    source: String,
    bounds: BoundingBox,
    index_kind: &'static str,
    governorates: Level,
    governorate_index: Box<dyn PolygonIndex>,
    districts: Level,
    district_index: Box<dyn PolygonIndex>,
    blocks: Level,
    blocks_by_district: HashMap<String, DistrictBlocks>,
    police_zones: Level,
    /// District code -> winning police zone slot
    police_by_district: HashMap<String, usize>,
    conflicts: HashMap<String, MembershipConflict>,
}

impl BoundarySnapshot {
    /// Validate `dataset` and build every index.
    ///
    /// Iteration order of each level is the dataset's order; overlapping
    /// polygons resolve to the earliest feature.
    pub fn build(
        dataset: BoundaryDataset,
        factory: &dyn SpatialIndexFactory,
        bounds: BoundingBox,
        version: u64,
        source: impl Into<String>,
    ) -> Result<Self, BoundaryLoadError> {
        let BoundaryDataset {
            governorates,
            districts,
            blocks,
            police_zones,
        } = dataset;

        let (governorates, governorate_areas) = split_areas(ZoneLevel::Governorate, governorates)?;
        require_non_empty(ZoneLevel::Governorate, &governorates)?;

        let (districts, district_areas) = split_areas(ZoneLevel::District, districts)?;
        require_non_empty(ZoneLevel::District, &districts)?;
        check_parents(ZoneLevel::District, &districts, &governorates, ZoneLevel::Governorate)?;

        let (blocks, block_points) = split_centroids(blocks)?;
        check_parents(ZoneLevel::Block, &blocks, &districts, ZoneLevel::District)?;

        // Membership drives police lookup; the areas are only validated.
        let (police_zones, _) = split_areas(ZoneLevel::PoliceZone, police_zones)?;

        let blocks_by_district = index_blocks(&blocks, &block_points, factory);
        let (police_by_district, conflicts) = map_police_memberships(&police_zones, &districts);

        Ok(Self {
            version,
            loaded_at: SystemTime::now(),
            source: source.into(),
            bounds,
            index_kind: factory.name(),
            governorate_index: factory.polygon_index(governorate_areas),
            governorates,
            district_index: factory.polygon_index(district_areas),
            districts,
            blocks,
            blocks_by_district,
            police_zones,
            police_by_district,
            conflicts,
        })
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn loaded_at(&self) -> SystemTime {
        self.loaded_at
    }

    /// Where the data came from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn bounds(&self) -> &BoundingBox {
        &self.bounds
    }

    /// Name of the spatial index implementation in use.
    pub fn index_kind(&self) -> &'static str {
        self.index_kind
    }

    fn level(&self, level: ZoneLevel) -> &Level {
        match level {
            ZoneLevel::Governorate => &self.governorates,
            ZoneLevel::District => &self.districts,
            ZoneLevel::Block => &self.blocks,
            ZoneLevel::PoliceZone => &self.police_zones,
        }
    }

    /// All zones of a level, in load order.
    pub fn zones(&self, level: ZoneLevel) -> &[Zone] {
        &self.level(level).zones
    }

    /// Look up a zone by level and code.
    pub fn zone(&self, level: ZoneLevel, code: &str) -> Option<&Zone> {
        self.level(level).get(code)
    }

    /// Number of zones at a level.
    pub fn count(&self, level: ZoneLevel) -> usize {
        self.level(level).zones.len()
    }

    /// Districts strictly containing `point`, in load order.
    pub fn districts_containing(&self, point: &Point<f64>) -> Vec<&Zone> {
        self.district_index
            .containing(point)
            .into_iter()
            .map(|slot| &self.districts.zones[slot])
            .collect()
    }

    /// Governorates strictly containing `point`, in load order.
    pub fn governorates_containing(&self, point: &Point<f64>) -> Vec<&Zone> {
        self.governorate_index
            .containing(point)
            .into_iter()
            .map(|slot| &self.governorates.zones[slot])
            .collect()
    }

    /// Nearest block of `district` to `point`, with its centroid.
    ///
    /// Ties go to the lowest block code.
    pub fn nearest_block(&self, district: &str, point: &Point<f64>) -> Option<(&Zone, Point<f64>)> {
        let group = self.blocks_by_district.get(district)?;
        let local = group.index.nearest(point)?;
        let slot = *group.slots.get(local)?;
        Some((&self.blocks.zones[slot], group.centroids[local]))
    }

    /// Blocks whose district reference is `district`, ordered by code.
    pub fn blocks_of(&self, district: &str) -> Vec<&Zone> {
        self.blocks_by_district
            .get(district)
            .map(|group| {
                group
                    .slots
                    .iter()
                    .map(|&slot| &self.blocks.zones[slot])
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Police zone administratively covering `district`, if any.
    pub fn police_zone_of(&self, district: &str) -> Option<&Zone> {
        self.police_by_district
            .get(district)
            .map(|&slot| &self.police_zones.zones[slot])
    }

    /// Competing police zones for `district`, when more than one claims it.
    pub fn membership_conflict(&self, district: &str) -> Option<&MembershipConflict> {
        self.conflicts.get(district)
    }

    /// Every membership conflict detected at load, ordered by district.
    pub fn membership_conflicts(&self) -> Vec<&MembershipConflict> {
        let mut conflicts: Vec<_> = self.conflicts.values().collect();
        conflicts.sort_by(|a, b| a.district.cmp(&b.district));
        conflicts
    }
}

impl std::fmt::Debug for BoundarySnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundarySnapshot")
            .field("version", &self.version)
            .field("source", &self.source)
            .field("index_kind", &self.index_kind)
            .field("governorates", &self.governorates.zones.len())
            .field("districts", &self.districts.zones.len())
            .field("blocks", &self.blocks.zones.len())
            .field("police_zones", &self.police_zones.zones.len())
            .finish()
    }
}

fn require_non_empty(level: ZoneLevel, zones: &Level) -> Result<(), BoundaryLoadError> {
    if zones.zones.is_empty() {
        return Err(BoundaryLoadError::Empty { level });
    }
    Ok(())
}

/// Index zones by code, rejecting duplicates.
fn build_level(level: ZoneLevel, zones: Vec<Zone>) -> Result<Level, BoundaryLoadError> {
    let mut by_code = HashMap::with_capacity(zones.len());
    for (slot, zone) in zones.iter().enumerate() {
        if by_code.insert(zone.code.clone(), slot).is_some() {
            return Err(BoundaryLoadError::DuplicateCode {
                level,
                code: zone.code.clone(),
            });
        }
    }
    Ok(Level { zones, by_code })
}

fn split_areas(
    level: ZoneLevel,
    features: Vec<BoundaryFeature>,
) -> Result<(Level, Vec<MultiPolygon<f64>>), BoundaryLoadError> {
    let mut zones = Vec::with_capacity(features.len());
    let mut areas = Vec::with_capacity(features.len());

    for BoundaryFeature { zone, geometry } in features {
        match geometry {
            ZoneGeometry::Area(area) => areas.push(area),
            other => {
                return Err(BoundaryLoadError::UnsupportedGeometry {
                    level,
                    code: zone.code,
                    expected: "polygon",
                    found: other.kind().to_string(),
                })
            }
        }
        zones.push(zone);
    }

    Ok((build_level(level, zones)?, areas))
}

fn split_centroids(
    features: Vec<BoundaryFeature>,
) -> Result<(Level, Vec<Point<f64>>), BoundaryLoadError> {
    let mut zones = Vec::with_capacity(features.len());
    let mut points = Vec::with_capacity(features.len());

    for BoundaryFeature { zone, geometry } in features {
        match geometry {
            ZoneGeometry::Centroid(point) => points.push(point),
            other => {
                return Err(BoundaryLoadError::UnsupportedGeometry {
                    level: ZoneLevel::Block,
                    code: zone.code,
                    expected: "point",
                    found: other.kind().to_string(),
                })
            }
        }
        zones.push(zone);
    }

    Ok((build_level(ZoneLevel::Block, zones)?, points))
}

/// Every zone must name a parent that exists one level up.
fn check_parents(
    level: ZoneLevel,
    children: &Level,
    parents: &Level,
    parent_level: ZoneLevel,
) -> Result<(), BoundaryLoadError> {
    for zone in &children.zones {
        let parent = zone
            .parent
            .as_deref()
            .ok_or_else(|| BoundaryLoadError::MissingParent {
                level,
                code: zone.code.clone(),
                parent_level,
            })?;
        if parents.get(parent).is_none() {
            return Err(BoundaryLoadError::DanglingReference {
                level,
                code: zone.code.clone(),
                parent_level,
                parent: parent.to_string(),
            });
        }
    }
    Ok(())
}

fn index_blocks(
    blocks: &Level,
    points: &[Point<f64>],
    factory: &dyn SpatialIndexFactory,
) -> HashMap<String, DistrictBlocks> {
    let mut grouped: HashMap<String, Vec<usize>> = HashMap::new();
    for (slot, zone) in blocks.zones.iter().enumerate() {
        // Parents were validated, so every block has one.
        if let Some(district) = &zone.parent {
            grouped.entry(district.clone()).or_default().push(slot);
        }
    }

    grouped
        .into_iter()
        .map(|(district, mut slots)| {
            // Sorting by code makes "lowest slot" mean "lowest code" in the index.
            slots.sort_by(|&a, &b| blocks.zones[a].code.cmp(&blocks.zones[b].code));
            let centroids: Vec<Point<f64>> = slots.iter().map(|&slot| points[slot]).collect();
            let index = factory.centroid_index(centroids.clone());
            (
                district,
                DistrictBlocks {
                    slots,
                    centroids,
                    index,
                },
            )
        })
        .collect()
}

fn map_police_memberships(
    police_zones: &Level,
    districts: &Level,
) -> (HashMap<String, usize>, HashMap<String, MembershipConflict>) {
    let mut by_district: HashMap<String, usize> = HashMap::new();
    let mut conflicts: HashMap<String, MembershipConflict> = HashMap::new();

    for (slot, zone) in police_zones.zones.iter().enumerate() {
        for district in &zone.covers {
            if districts.get(district).is_none() {
                tracing::warn!(
                    "police zone {} covers unknown district {}, ignoring",
                    zone.code,
                    district
                );
                continue;
            }

            match by_district.get(district) {
                None => {
                    by_district.insert(district.clone(), slot);
                }
                Some(&winner) if winner == slot => {}
                Some(&winner) => {
                    let conflict = conflicts.entry(district.clone()).or_insert_with(|| {
                        MembershipConflict {
                            district: district.clone(),
                            police_zones: vec![police_zones.zones[winner].code.clone()],
                        }
                    });
                    conflict.police_zones.push(zone.code.clone());
                    tracing::warn!(
                        "district {} claimed by police zones {:?}, keeping {}",
                        district,
                        conflict.police_zones,
                        police_zones.zones[winner].code
                    );
                }
            }
        }
    }

    (by_district, conflicts)
}
