use glam::Vec3;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// World position. Only `x` and `y` take part in interest decisions.
pub type Position = Vec3;

/// Unique identifier for an observable entity in the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle for a live viewer connection.
///
/// Assigned by the transport when the client joins; never reused while the
/// connection is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(pub u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// Privilege flags attached to the player behind a connection.
///
/// These are opaque predicates decided elsewhere (admin lists, ghost state,
/// camera scripts); the interest core only reads them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewerRoles {
    /// Dead or spectating player.
    pub ghost: bool,
    /// Holds administrator privilege.
    pub admin: bool,
    /// Has a remote viewer attached (camera feed, AI core).
    pub remote_viewer: bool,
}

impl ViewerRoles {
    pub const NONE: Self = Self {
        ghost: false,
        admin: false,
        remote_viewer: false,
    };

    pub fn admin() -> Self {
        Self {
            admin: true,
            ..Self::NONE
        }
    }

    pub fn ghost() -> Self {
        Self {
            ghost: true,
            ..Self::NONE
        }
    }

    pub fn remote_viewer() -> Self {
        Self {
            remote_viewer: true,
            ..Self::NONE
        }
    }

    /// Ghosts and administrators watch every player regardless of distance.
    pub fn watches_players(&self) -> bool {
        self.ghost || self.admin
    }

    pub fn is_privileged(&self) -> bool {
        self.ghost || self.admin || self.remote_viewer
    }
}

/// Per-tick view of a connection as reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConnectionSnapshot {
    pub id: ConnectionId,
    /// Position of the entity this connection controls, if it has joined
    /// the world with one.
    pub position: Option<Position>,
    pub authenticated: bool,
    pub roles: ViewerRoles,
}

impl ConnectionSnapshot {
    /// An authenticated connection controlling an entity at `position`.
    pub fn joined(id: ConnectionId, position: Position) -> Self {
        Self {
            id,
            position: Some(position),
            authenticated: true,
            roles: ViewerRoles::NONE,
        }
    }

    pub fn with_roles(mut self, roles: ViewerRoles) -> Self {
        self.roles = roles;
        self
    }
}

/// View of an entity that needs an observer set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub id: EntityId,
    pub position: Option<Position>,
    /// Connection controlling this entity, if it is player-controlled.
    pub owner: Option<ConnectionId>,
}

impl EntitySnapshot {
    pub fn is_player_controlled(&self) -> bool {
        self.owner.is_some()
    }
}
