//! Adapters Layer
//!
//! Inbound adapters drive the application (HTTP API); outbound adapters
//! implement the domain ports (boundary files, spatial indexes, audit
//! log, metrics).

pub mod inbound;
pub mod outbound;
