mod boundary_source;
mod resolution_log_sink;
mod resolution_metrics;
mod spatial_index;

pub use boundary_source::BoundarySource;
pub use resolution_log_sink::ResolutionLogSink;
pub use resolution_metrics::{MetricsSnapshot, ResolutionMetrics};
pub use spatial_index::{CentroidIndex, LocalProjection, PolygonIndex, SpatialIndexFactory};
