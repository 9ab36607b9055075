//! Shared types for the vantage workspace.
//!
//! Everything here is plain data handed across crate boundaries: the
//! interest core reads these snapshots, the hosting world produces them.

mod types;

pub use types::{ConnectionId, ConnectionSnapshot, EntityId, EntitySnapshot, Position, ViewerRoles};
