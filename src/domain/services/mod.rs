mod boundary_store;
mod hierarchy;
mod resolver;

pub use boundary_store::{BoundarySnapshot, MembershipConflict};
pub use hierarchy::HierarchyAggregator;
pub use resolver::Resolver;
