//! Domain errors.

use crate::domain::value_objects::ZoneLevel;
use std::path::PathBuf;

/// Structural failure while loading boundary data.
///
/// Fatal at startup: no resolution is served against a partially loaded
/// store. On reload the previous snapshot keeps serving.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BoundaryLoadError {
    #[error("cannot read {level} boundaries from {}: {reason}", path.display())]
    Io {
        level: ZoneLevel,
        path: PathBuf,
        reason: String,
    },
    #[error("malformed {level} boundaries: {reason}")]
    Malformed { level: ZoneLevel, reason: String },
    #[error("{level} feature #{index} has no code")]
    MissingCode { level: ZoneLevel, index: usize },
    #[error("{level} {code} has no geometry")]
    MissingGeometry { level: ZoneLevel, code: String },
    #[error("{level} {code} has a {found} geometry, expected {expected}")]
    UnsupportedGeometry {
        level: ZoneLevel,
        code: String,
        expected: &'static str,
        found: String,
    },
    #[error("duplicate {level} code {code}")]
    DuplicateCode { level: ZoneLevel, code: String },
    #[error("{level} {code} has no {parent_level} reference")]
    MissingParent {
        level: ZoneLevel,
        code: String,
        parent_level: ZoneLevel,
    },
    #[error("{level} {code} references unknown {parent_level} {parent}")]
    DanglingReference {
        level: ZoneLevel,
        code: String,
        parent_level: ZoneLevel,
        parent: String,
    },
    #[error("no {level} features loaded")]
    Empty { level: ZoneLevel },
}

impl BoundaryLoadError {
    /// The entity set the failure concerns.
    pub fn level(&self) -> ZoneLevel {
        match self {
            Self::Io { level, .. }
            | Self::Malformed { level, .. }
            | Self::MissingCode { level, .. }
            | Self::MissingGeometry { level, .. }
            | Self::UnsupportedGeometry { level, .. }
            | Self::DuplicateCode { level, .. }
            | Self::MissingParent { level, .. }
            | Self::DanglingReference { level, .. }
            | Self::Empty { level } => *level,
        }
    }
}

/// Failure writing to the audit log sink.
///
/// Never surfaces to resolution callers; the log writer counts and drops.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LogSinkError {
    #[error("log sink unavailable: {0}")]
    Unavailable(String),

    /// Some entries of a batch were refused; the rest were stored.
    #[error("log sink rejected {rejected} of {total} entries: {reason}")]
    Rejected {
        rejected: usize,
        total: usize,
        reason: String,
    },
}
