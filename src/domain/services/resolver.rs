//! Resolver Service
//!
//! Pure domain logic mapping a coordinate onto the administrative
//! hierarchy of one boundary snapshot.

use crate::domain::entities::{ResolutionResult, Zone};
use crate::domain::services::BoundarySnapshot;
use crate::domain::value_objects::{Coordinate, ResolutionStatus, ZoneLevel};
use geo::HaversineDistance;

/// Resolver bound to one snapshot.
///
/// Resolution steps, each independent of the others' success:
/// 1. Bounding-box plausibility check (`out_of_bounds` outside)
/// 2. District by point-in-polygon; first in load order wins
/// 3. Governorate read from the district's reference
/// 4. Nearest block centroid within the district
/// 5. Police zone by district membership
///
/// The resolver holds only a shared reference, so any number of threads
/// may resolve against the same snapshot concurrently.
pub struct Resolver<'a> {
    snapshot: &'a BoundarySnapshot,
    governorate_fallback: bool,
}

impl<'a> Resolver<'a> {
    pub fn new(snapshot: &'a BoundarySnapshot) -> Self {
        Self {
            snapshot,
            governorate_fallback: false,
        }
    }

    /// Fall back to governorate polygons when no district contains the point.
    pub fn with_governorate_fallback(mut self, enabled: bool) -> Self {
        self.governorate_fallback = enabled;
        self
    }

    /// Resolve a coordinate.
    ///
    /// # Arguments
    /// * `coord` - Input coordinate
    /// * `on_overlap` - Called with the level and matching codes (winner
    ///   first) whenever more than one zone matched
    ///
    /// # Example
    /// ```ignore
    /// let result = Resolver::new(&snapshot).resolve(
    ///     Coordinate::new(29.3759, 47.9774),
    ///     |level, codes| metrics.record_overlap(level, codes),
    /// );
    /// ```
    pub fn resolve<F>(&self, coord: Coordinate, mut on_overlap: F) -> ResolutionResult
    where
        F: FnMut(ZoneLevel, &[&str]),
    {
        let version = self.snapshot.version();

        if !self.snapshot.bounds().contains(&coord) {
            return ResolutionResult::out_of_bounds(version);
        }

        let point = coord.to_point();
        let districts = self.snapshot.districts_containing(&point);
        report_overlap(ZoneLevel::District, &districts, &mut on_overlap);

        let Some(district) = districts.first().copied() else {
            return self.resolve_without_district(coord, &mut on_overlap);
        };

        let governorate = district
            .parent
            .as_deref()
            .and_then(|code| self.snapshot.zone(ZoneLevel::Governorate, code))
            .map(|zone| zone.code.clone());

        let (block, block_distance_m) = match self.snapshot.nearest_block(&district.code, &point) {
            Some((zone, centroid)) => (Some(zone.code.clone()), Some(point.haversine_distance(&centroid))),
            None => (None, None),
        };

        if let Some(conflict) = self.snapshot.membership_conflict(&district.code) {
            let codes: Vec<&str> = conflict.police_zones.iter().map(String::as_str).collect();
            on_overlap(ZoneLevel::PoliceZone, &codes);
        }
        let police_zone = self
            .snapshot
            .police_zone_of(&district.code)
            .map(|zone| zone.code.clone());

        let status = if governorate.is_some() && block.is_some() && police_zone.is_some() {
            ResolutionStatus::Resolved
        } else {
            ResolutionStatus::Partial
        };

        ResolutionResult {
            governorate,
            district: Some(district.code.clone()),
            block,
            police_zone,
            status,
            block_distance_m,
            snapshot_version: version,
        }
    }

    /// Blocks and police zones need a district, so only the governorate
    /// can still be found here.
    fn resolve_without_district<F>(&self, coord: Coordinate, on_overlap: &mut F) -> ResolutionResult
    where
        F: FnMut(ZoneLevel, &[&str]),
    {
        let version = self.snapshot.version();
        if !self.governorate_fallback {
            return ResolutionResult::unresolved(version);
        }

        let governorates = self.snapshot.governorates_containing(&coord.to_point());
        report_overlap(ZoneLevel::Governorate, &governorates, on_overlap);

        match governorates.first() {
            Some(governorate) => ResolutionResult {
                governorate: Some(governorate.code.clone()),
                status: ResolutionStatus::GovernorateOnly,
                ..ResolutionResult::unresolved(version)
            },
            None => ResolutionResult::unresolved(version),
        }
    }
}

fn report_overlap<F>(level: ZoneLevel, matches: &[&Zone], on_overlap: &mut F)
where
    F: FnMut(ZoneLevel, &[&str]),
{
    if matches.len() > 1 {
        let codes: Vec<&str> = matches.iter().map(|zone| zone.code.as_str()).collect();
        on_overlap(level, &codes);
    }
}
