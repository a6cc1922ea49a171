//! Infrastructure Layer
//!
//! Cross-cutting concerns and infrastructure components.

pub mod boundary_watcher;
pub mod shutdown;

pub use boundary_watcher::BoundaryWatcher;
pub use shutdown::{shutdown_signal, ShutdownController, WorkGuard};
