//! Zone Resolver Library
//!
//! Maps coordinates onto Kuwait's administrative hierarchy (governorate,
//! district, block) and police zones. Exposed as a library for ETL jobs
//! and integration tests; the binary adds the HTTP API.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-export commonly used types
pub use application::{BoundaryCache, ResolutionLogWriter, ResolutionService};
pub use config::{load_config, Config, SpatialIndexKind};
pub use domain::entities::{BoundaryDataset, ResolutionLogEntry, ResolutionResult, Zone};
pub use domain::error::{BoundaryLoadError, LogSinkError};
pub use domain::ports::{BoundarySource, ResolutionLogSink, ResolutionMetrics, SpatialIndexFactory};
pub use domain::services::{BoundarySnapshot, HierarchyAggregator, Resolver};
pub use domain::value_objects::{BoundingBox, Coordinate, ResolutionStatus, ZoneLevel};
