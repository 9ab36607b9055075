//! Observer membership rules.
//!
//! Two entry points share the same rules:
//! - [`ObserverPolicy::check_observer`] decides a single (entity, connection)
//!   pair by comparing projected cells directly.
//! - [`ObserverPolicy::rebuild_observers`] produces the full set for one
//!   entity from the privileged viewers and a grid neighbourhood query.
//!
//! For a connection present in the [`ViewerTable`] both must agree.

use std::collections::HashSet;

use vantage_common::{ConnectionId, ConnectionSnapshot, EntitySnapshot};

use crate::grid::GridProjector;
use crate::viewers::ViewerTable;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObserverPolicy {
    projector: GridProjector,
    remote_viewers_see_world: bool,
}

impl ObserverPolicy {
    pub fn new(projector: GridProjector, remote_viewers_see_world: bool) -> Self {
        Self {
            projector,
            remote_viewers_see_world,
        }
    }

    pub fn projector(&self) -> &GridProjector {
        &self.projector
    }

    /// Whether a distance-independent override makes `viewer` observe
    /// `entity`.
    ///
    /// Overrides only apply to other players' entities; the owner is never
    /// matched here.
    pub fn override_applies(&self, entity: &EntitySnapshot, viewer: &ConnectionSnapshot) -> bool {
        if !viewer.authenticated || entity.owner == Some(viewer.id) {
            return false;
        }
        let player_controlled = entity.is_player_controlled();
        if viewer.roles.remote_viewer && (player_controlled || self.remote_viewers_see_world) {
            return true;
        }
        player_controlled && viewer.roles.watches_players()
    }

    /// Whether `viewer` should observe `entity` right now.
    pub fn check_observer(&self, entity: &EntitySnapshot, viewer: &ConnectionSnapshot) -> bool {
        if !viewer.authenticated {
            return false;
        }
        if entity.owner == Some(viewer.id) {
            return true;
        }
        if self.override_applies(entity, viewer) {
            return true;
        }
        let at = entity.position.and_then(|p| self.projector.try_project(p));
        let from = viewer.position.and_then(|p| self.projector.try_project(p));
        match (at, from) {
            (Some(at), Some(from)) => at.is_neighbor(from),
            _ => false,
        }
    }

    /// Recompute the full observer set of `entity` into `out`.
    ///
    /// `out` is cleared first and only reused for its allocation.
    pub fn rebuild_observers(
        &self,
        entity: &EntitySnapshot,
        viewers: &ViewerTable,
        out: &mut HashSet<ConnectionId>,
    ) {
        out.clear();

        for viewer in viewers.privileged() {
            if self.override_applies(entity, viewer) {
                out.insert(viewer.id);
            }
        }

        if let Some(owner) = entity.owner.filter(|id| viewers.contains(*id)) {
            out.insert(owner);
        }

        if let Some(cell) = entity.position.and_then(|p| self.projector.try_project(p)) {
            viewers.grid().query_with_neighbors(cell, out);
        }
    }
}
