//! Application Layer
//!
//! Use cases composed from domain services and ports.

mod boundary_cache;
mod log_writer;
mod resolution_service;

pub use boundary_cache::BoundaryCache;
pub use log_writer::{LogWriterStats, ResolutionLogWriter};
pub use resolution_service::{ResolutionService, ServiceMetrics, SnapshotInfo};
