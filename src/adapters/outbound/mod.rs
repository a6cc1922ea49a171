mod dashmap_resolution_metrics;
mod envelope_scan_index;
mod geojson_boundary_source;
mod rtree_spatial_index;
mod sqlite_resolution_log;

pub use dashmap_resolution_metrics::DashMapResolutionMetrics;
pub use envelope_scan_index::EnvelopeScanIndexFactory;
pub use geojson_boundary_source::{parse_collection, GeoJsonBoundarySource};
pub use rtree_spatial_index::RTreeIndexFactory;
pub use sqlite_resolution_log::SqliteResolutionLog;
