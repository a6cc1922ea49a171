//! Resolution Log Sink Port
//!
//! Defines the interface for the durable, append-only audit log.

use crate::domain::entities::ResolutionLogEntry;
use crate::domain::error::LogSinkError;
use async_trait::async_trait;

/// Durable append-only store for resolution audit entries.
///
/// Implementations must only ever append: no entry is edited or
/// removed through this interface.
#[async_trait]
pub trait ResolutionLogSink: Send + Sync {
    /// Append entries in the given order.
    async fn append(&self, entries: &[ResolutionLogEntry]) -> Result<(), LogSinkError>;
}
