//! Hierarchy Aggregator
//!
//! Reverse queries over one snapshot: which districts a police zone
//! covers, which blocks a district holds. Used to scope per-zone work.

use crate::domain::entities::Zone;
use crate::domain::services::BoundarySnapshot;
use crate::domain::value_objects::ZoneLevel;
use std::collections::BTreeMap;

/// Read-only derivations over a snapshot.
///
/// Results are ordered by code and identical across repeated calls on the
/// same snapshot. `None` means the container code itself is unknown.
pub struct HierarchyAggregator<'a> {
    snapshot: &'a BoundarySnapshot,
}

impl<'a> HierarchyAggregator<'a> {
    pub fn new(snapshot: &'a BoundarySnapshot) -> Self {
        Self { snapshot }
    }

    /// Districts listed in a police zone's membership set.
    ///
    /// Members that are not loaded districts are skipped.
    pub fn districts_in_police_zone(&self, code: &str) -> Option<Vec<&'a Zone>> {
        let zone = self.snapshot.zone(ZoneLevel::PoliceZone, code)?;
        let snapshot = self.snapshot;
        let districts = zone
            .covers
            .iter()
            .filter_map(|district| snapshot.zone(ZoneLevel::District, district))
            .map(|district| (district.code.as_str(), district))
            .collect::<BTreeMap<_, _>>();
        Some(districts.into_values().collect())
    }

    /// Blocks whose district reference equals `code`.
    pub fn blocks_in_district(&self, code: &str) -> Option<Vec<&'a Zone>> {
        let snapshot = self.snapshot;
        snapshot.zone(ZoneLevel::District, code)?;
        Some(snapshot.blocks_of(code))
    }

    /// Districts whose governorate reference equals `code`.
    pub fn districts_in_governorate(&self, code: &str) -> Option<Vec<&'a Zone>> {
        let snapshot = self.snapshot;
        snapshot.zone(ZoneLevel::Governorate, code)?;
        let mut districts: Vec<&Zone> = snapshot
            .zones(ZoneLevel::District)
            .iter()
            .filter(|district| district.parent.as_deref() == Some(code))
            .collect();
        districts.sort_by(|a, b| a.code.cmp(&b.code));
        Some(districts)
    }

    /// Districts no police zone covers, ordered by code.
    pub fn unmapped_districts(&self) -> Vec<&'a Zone> {
        let snapshot = self.snapshot;
        let mut districts: Vec<&Zone> = snapshot
            .zones(ZoneLevel::District)
            .iter()
            .filter(|district| snapshot.police_zone_of(&district.code).is_none())
            .collect();
        districts.sort_by(|a, b| a.code.cmp(&b.code));
        districts
    }

    /// All zones of a level, ordered by code.
    pub fn zones(&self, level: ZoneLevel) -> Vec<&'a Zone> {
        let snapshot = self.snapshot;
        let mut zones: Vec<&Zone> = snapshot.zones(level).iter().collect();
        zones.sort_by(|a, b| a.code.cmp(&b.code));
        zones
    }
}
