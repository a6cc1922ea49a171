//! Envelope Scan Index
//!
//! Implements the spatial index ports with a linear scan guarded by a
//! bounding-box check. No tree to build, so loads are faster; queries are
//! O(n). Suitable for small boundary sets and as a reference for the
//! R-tree index.

use crate::domain::ports::{CentroidIndex, LocalProjection, PolygonIndex, SpatialIndexFactory};
use geo::{BoundingRect, Contains, MultiPolygon, Point, Rect};

pub struct EnvelopeScanPolygonIndex {
    areas: Vec<(Option<Rect<f64>>, MultiPolygon<f64>)>,
}

impl EnvelopeScanPolygonIndex {
    pub fn new(areas: Vec<MultiPolygon<f64>>) -> Self {
        Self {
            areas: areas
                .into_iter()
                .map(|area| (area.bounding_rect(), area))
                .collect(),
        }
    }
}

fn rect_covers(rect: &Rect<f64>, point: &Point<f64>) -> bool {
    let (min, max) = (rect.min(), rect.max());
    point.x() >= min.x && point.x() <= max.x && point.y() >= min.y && point.y() <= max.y
}

impl PolygonIndex for EnvelopeScanPolygonIndex {
    fn containing(&self, point: &Point<f64>) -> Vec<usize> {
        self.areas
            .iter()
            .enumerate()
            .filter(|(_, (rect, area))| {
                rect.as_ref().is_some_and(|r| rect_covers(r, point)) && area.contains(point)
            })
            .map(|(slot, _)| slot)
            .collect()
    }

    fn len(&self) -> usize {
        self.areas.len()
    }
}

pub struct EnvelopeScanCentroidIndex {
    /// Centroids in projected coordinates
    centroids: Vec<[f64; 2]>,
    projection: LocalProjection,
}

impl EnvelopeScanCentroidIndex {
    pub fn new(centroids: Vec<Point<f64>>) -> Self {
        let projection = LocalProjection::fit(&centroids);
        Self {
            centroids: centroids.iter().map(|p| projection.project(p)).collect(),
            projection,
        }
    }
}

impl CentroidIndex for EnvelopeScanCentroidIndex {
    fn nearest(&self, point: &Point<f64>) -> Option<usize> {
        let [x, y] = self.projection.project(point);
        let mut best: Option<(usize, f64)> = None;
        for (slot, centroid) in self.centroids.iter().enumerate() {
            let dx = centroid[0] - x;
            let dy = centroid[1] - y;
            let distance = dx * dx + dy * dy;
            // Strictly-less keeps the lowest slot on ties.
            match best {
                Some((_, best_distance)) if distance >= best_distance => {}
                _ => best = Some((slot, distance)),
            }
        }
        best.map(|(slot, _)| slot)
    }

    fn len(&self) -> usize {
        self.centroids.len()
    }
}

/// Factory producing envelope-scan indexes.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvelopeScanIndexFactory;

impl SpatialIndexFactory for EnvelopeScanIndexFactory {
    fn name(&self) -> &'static str {
        "scan"
    }

    fn polygon_index(&self, areas: Vec<MultiPolygon<f64>>) -> Box<dyn PolygonIndex> {
        Box::new(EnvelopeScanPolygonIndex::new(areas))
    }

    fn centroid_index(&self, centroids: Vec<Point<f64>>) -> Box<dyn CentroidIndex> {
        Box::new(EnvelopeScanCentroidIndex::new(centroids))
    }
}
