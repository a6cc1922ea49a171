//! Boundary Source Port
//!
//! Defines the interface for reading raw boundary definitions.
//! Implementations may read GeoJSON files or serve an in-memory dataset.

use crate::domain::entities::BoundaryDataset;
use crate::domain::error::BoundaryLoadError;

/// Source of governorate, district, block and police-zone definitions.
///
/// This is an outbound port. Loading is synchronous and may be slow;
/// callers run it off the async executor.
pub trait BoundarySource: Send + Sync {
    /// Human-readable location of the data, for logs.
    fn describe(&self) -> String;

    /// Read every level. Fails if any feature lacks a code or geometry.
    fn load(&self) -> Result<BoundaryDataset, BoundaryLoadError>;
}

/// An in-memory dataset is its own source.
impl BoundarySource for BoundaryDataset {
    fn describe(&self) -> String {
        format!("in-memory dataset ({} features)", self.len())
    }

    fn load(&self) -> Result<BoundaryDataset, BoundaryLoadError> {
        Ok(self.clone())
    }
}
