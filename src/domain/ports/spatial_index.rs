//! Spatial Index Port
//!
//! Abstracts the acceleration structure behind containment tests and
//! nearest-centroid search, so the resolver does not depend on it.

use geo::{MultiPolygon, Point};

/// Prepared set of areas answering "which areas contain this point".
///
/// Slots are positions in the vector the index was built from.
pub trait PolygonIndex: Send + Sync {
    /// Slots of every area strictly containing `point`, ascending.
    fn containing(&self, point: &Point<f64>) -> Vec<usize>;

    /// Number of indexed areas.
    fn len(&self) -> usize;
}

/// Prepared set of points answering "which point is nearest".
///
/// Distances are measured in a [`LocalProjection`] fitted to the indexed
/// centroids, so ranking agrees with ground distance at any latitude.
pub trait CentroidIndex: Send + Sync {
    /// Slot of the centroid nearest to `point`.
    ///
    /// Equal distances resolve to the lowest slot. `None` when empty.
    fn nearest(&self, point: &Point<f64>) -> Option<usize>;

    fn len(&self) -> usize;
}

/// Builds indexes once per boundary load.
pub trait SpatialIndexFactory: Send + Sync {
    /// Short name for logs and configuration.
    fn name(&self) -> &'static str;

    fn polygon_index(&self, areas: Vec<MultiPolygon<f64>>) -> Box<dyn PolygonIndex>;

    fn centroid_index(&self, centroids: Vec<Point<f64>>) -> Box<dyn CentroidIndex>;
}

/// Equirectangular projection around the mean latitude of a point set.
///
/// Longitude degrees shrink by `cos(lat)`; scaling x by that factor makes
/// planar distance proportional to ground distance over one district.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalProjection {
    x_scale: f64,
}

impl LocalProjection {
    pub fn fit(points: &[Point<f64>]) -> Self {
        if points.is_empty() {
            return Self { x_scale: 1.0 };
        }
        let mean_lat = points.iter().map(|p| p.y()).sum::<f64>() / points.len() as f64;
        Self {
            x_scale: mean_lat.to_radians().cos(),
        }
    }

    pub fn project(&self, point: &Point<f64>) -> [f64; 2] {
        [point.x() * self.x_scale, point.y()]
    }
}
