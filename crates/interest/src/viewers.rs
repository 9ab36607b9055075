use std::collections::HashMap;

use vantage_common::{ConnectionId, ConnectionSnapshot};

use crate::grid::{GridProjector, SpatialGrid};

/// Per-tick index of the live viewers.
///
/// Rebuilt from scratch on every refresh so that moved or disconnected
/// connections never linger. Unauthenticated connections are dropped
/// entirely; privileged viewers are kept in a separate list so override
/// rules do not rescan every connection for every entity.
#[derive(Debug, Default)]
pub struct ViewerTable {
    grid: SpatialGrid<ConnectionId>,
    connections: HashMap<ConnectionId, ConnectionSnapshot>,
    privileged: Vec<ConnectionSnapshot>,
}

impl ViewerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the table contents with `connections`, placing each
    /// positioned connection in the grid cell `projector` assigns it.
    /// Returns the number of grid placements.
    pub fn refresh<I>(&mut self, projector: &GridProjector, connections: I) -> usize
    where
        I: IntoIterator<Item = ConnectionSnapshot>,
    {
        self.grid.clear();
        self.connections.clear();
        self.privileged.clear();

        let mut placed = 0;
        for conn in connections {
            if !conn.authenticated {
                continue;
            }
            if conn.roles.is_privileged() {
                self.privileged.push(conn);
            }
            if let Some(cell) = conn.position.and_then(|p| projector.try_project(p)) {
                self.grid.insert(cell, conn.id);
                placed += 1;
            }
            self.connections.insert(conn.id, conn);
        }
        placed
    }

    pub fn grid(&self) -> &SpatialGrid<ConnectionId> {
        &self.grid
    }

    /// Authenticated connection by id, as of the last refresh.
    pub fn get(&self, id: ConnectionId) -> Option<&ConnectionSnapshot> {
        self.connections.get(&id)
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    /// Authenticated connections holding any viewer role.
    pub fn privileged(&self) -> &[ConnectionSnapshot] {
        &self.privileged
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
