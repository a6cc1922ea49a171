//! R-tree Spatial Index
//!
//! Implements the spatial index ports with `rstar` R-trees: bounding
//! boxes prefilter candidates, exact containment runs on the survivors.

use crate::domain::ports::{CentroidIndex, LocalProjection, PolygonIndex, SpatialIndexFactory};
use geo::{BoundingRect, Contains, MultiPolygon, Point};
use rstar::primitives::GeomWithData;
use rstar::{RTree, RTreeObject, AABB};

/// Envelope of one indexed area.
#[derive(Debug, Clone)]
struct IndexedArea {
    slot: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedArea {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// R-tree over area envelopes.
pub struct RTreePolygonIndex {
    tree: RTree<IndexedArea>,
    areas: Vec<MultiPolygon<f64>>,
}

impl RTreePolygonIndex {
    pub fn new(areas: Vec<MultiPolygon<f64>>) -> Self {
        let entries = areas
            .iter()
            .enumerate()
            .filter_map(|(slot, area)| {
                // Empty geometries have no envelope and can contain nothing.
                let rect = area.bounding_rect()?;
                Some(IndexedArea {
                    slot,
                    envelope: AABB::from_corners(
                        [rect.min().x, rect.min().y],
                        [rect.max().x, rect.max().y],
                    ),
                })
            })
            .collect();

        Self {
            tree: RTree::bulk_load(entries),
            areas,
        }
    }
}

impl PolygonIndex for RTreePolygonIndex {
    fn containing(&self, point: &Point<f64>) -> Vec<usize> {
        let probe = AABB::from_point([point.x(), point.y()]);
        let mut slots: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&probe)
            .map(|entry| entry.slot)
            .filter(|&slot| self.areas[slot].contains(point))
            .collect();
        // The tree yields candidates in arbitrary order; load order decides ties.
        slots.sort_unstable();
        slots
    }

    fn len(&self) -> usize {
        self.areas.len()
    }
}

/// R-tree over centroid points, tagged with their slot.
pub struct RTreeCentroidIndex {
    tree: RTree<GeomWithData<[f64; 2], usize>>,
    projection: LocalProjection,
}

impl RTreeCentroidIndex {
    pub fn new(centroids: Vec<Point<f64>>) -> Self {
        let projection = LocalProjection::fit(&centroids);
        let entries = centroids
            .iter()
            .enumerate()
            .map(|(slot, p)| GeomWithData::new(projection.project(p), slot))
            .collect();
        Self {
            tree: RTree::bulk_load(entries),
            projection,
        }
    }
}

impl CentroidIndex for RTreeCentroidIndex {
    fn nearest(&self, point: &Point<f64>) -> Option<usize> {
        let mut neighbors = self
            .tree
            .nearest_neighbor_iter_with_distance_2(&self.projection.project(point));
        let (first, best) = neighbors.next()?;
        let mut slot = first.data;
        for (candidate, distance) in neighbors {
            if distance > best {
                break;
            }
            slot = slot.min(candidate.data);
        }
        Some(slot)
    }

    fn len(&self) -> usize {
        self.tree.size()
    }
}

/// Factory producing R-tree indexes.
#[derive(Debug, Clone, Copy, Default)]
pub struct RTreeIndexFactory;

impl SpatialIndexFactory for RTreeIndexFactory {
    fn name(&self) -> &'static str {
        "rtree"
    }

    fn polygon_index(&self, areas: Vec<MultiPolygon<f64>>) -> Box<dyn PolygonIndex> {
        Box::new(RTreePolygonIndex::new(areas))
    }

    fn centroid_index(&self, centroids: Vec<Point<f64>>) -> Box<dyn CentroidIndex> {
        Box::new(RTreeCentroidIndex::new(centroids))
    }
}
