//! Spatial interest management: which connections observe which entities.
//!
//! # Invariants
//! - The grid is cleared and repopulated from live connections every tick,
//!   so no observer set computed after a refresh references a connection
//!   that has since moved away or disconnected.
//! - At most one rebuild pass is in flight. Requests made while one runs are
//!   dropped.
//! - A rebuild pass never processes more than `entities_per_quantum`
//!   entities per tick, and every entity of its snapshot exactly once.
//!
//! Entities and connections are never owned here: the host exposes them
//! through [`InterestHost`] and receives finished sets through
//! [`ObserverSink`].

mod config;
mod grid;
mod manager;
mod policy;
mod scheduler;
mod viewers;

pub use config::{ConfigError, InterestConfig};
pub use grid::{CellCoord, GridProjector, SpatialGrid};
pub use manager::{InterestHost, InterestManager, InterestStats, ObserverSink};
pub use policy::ObserverPolicy;
pub use scheduler::{QuantumReport, RebuildCursor, RebuildScheduler, RebuildState};
pub use viewers::ViewerTable;

pub fn crate_info() -> &'static str {
    "vantage-interest v0.1.0"
}
