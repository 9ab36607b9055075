use std::collections::BTreeMap;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vantage_common::{ConnectionId, ConnectionSnapshot, EntityId, EntitySnapshot, ViewerRoles};
use vantage_interest::{ConfigError, InterestHost};

/// Errors from operations on the simulated world.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimError {
    #[error("unknown entity {0:?}")]
    UnknownEntity(EntityId),
    #[error("unknown connection {0}")]
    UnknownConnection(ConnectionId),
    #[error("world size must be finite and positive, got {0}")]
    InvalidWorldSize(f32),
    #[error(transparent)]
    Interest(#[from] ConfigError),
}

/// Shape of a generated world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub seed: u64,
    /// Side length of the square world, centred on the origin.
    pub world_size: f32,
    /// Maximum distance an entity wanders per tick.
    pub speed: f32,
    /// Ordinary players, each controlling one entity.
    pub players: usize,
    pub admins: usize,
    pub ghosts: usize,
    /// Remote camera feeds. They join without a controlled entity.
    pub cameras: usize,
    /// Unowned world objects.
    pub objects: usize,
    /// Fraction of world objects that wander each tick.
    pub mobile_share: f32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            world_size: 1000.0,
            speed: 2.0,
            players: 64,
            admins: 1,
            ghosts: 2,
            cameras: 1,
            objects: 2000,
            mobile_share: 0.1,
        }
    }
}

#[derive(Debug, Clone)]
struct SimConnection {
    controlled: Option<EntityId>,
    authenticated: bool,
    roles: ViewerRoles,
}

#[derive(Debug, Clone)]
struct SimEntity {
    position: Vec3,
    owner: Option<ConnectionId>,
    mobile: bool,
}

/// In-memory authoritative world of connections and entities.
///
/// Uses BTreeMap for deterministic iteration, and a splitmix64 stream for
/// ids and movement, so the same seed and operations reproduce the same
/// world.
#[derive(Debug, Clone)]
pub struct SimWorld {
    tick: u64,
    rng: u64,
    half_extent: f32,
    speed: f32,
    authoritative: bool,
    next_connection: u64,
    connections: BTreeMap<ConnectionId, SimConnection>,
    entities: BTreeMap<EntityId, SimEntity>,
}

impl SimWorld {
    /// Create an empty world of side `world_size`.
    pub fn new(seed: u64, world_size: f32) -> Result<Self, SimError> {
        if !world_size.is_finite() || world_size <= 0.0 {
            return Err(SimError::InvalidWorldSize(world_size));
        }
        Ok(Self {
            tick: 0,
            rng: seed,
            half_extent: world_size / 2.0,
            speed: 0.0,
            authoritative: true,
            next_connection: 1,
            connections: BTreeMap::new(),
            entities: BTreeMap::new(),
        })
    }

    /// Populate a world according to `config`.
    pub fn generate(config: &SimConfig) -> Result<Self, SimError> {
        let mut world = Self::new(config.seed, config.world_size)?;
        world.speed = config.speed;

        let groups = [
            (config.players, ViewerRoles::NONE),
            (config.admins, ViewerRoles::admin()),
            (config.ghosts, ViewerRoles::ghost()),
        ];
        for (count, roles) in groups {
            for _ in 0..count {
                let at = world.random_position();
                world.join(at, roles);
            }
        }
        for _ in 0..config.cameras {
            world.connect_viewer(ViewerRoles::remote_viewer());
        }
        for _ in 0..config.objects {
            let at = world.random_position();
            let id = world.spawn(at, None);
            let mobile = world.next_unit() < config.mobile_share;
            if let Some(e) = world.entities.get_mut(&id) {
                e.mobile = mobile;
            }
        }

        tracing::debug!(
            connections = world.connections.len(),
            entities = world.entities.len(),
            "generated world"
        );
        Ok(world)
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn set_authoritative(&mut self, authoritative: bool) {
        self.authoritative = authoritative;
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed;
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn connection_ids(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.connections.keys().copied()
    }

    /// Entity controlled by `connection`, if any.
    pub fn controlled_entity(&self, connection: ConnectionId) -> Option<EntityId> {
        self.connections.get(&connection)?.controlled
    }

    /// Connect a player and spawn the entity it controls at `position`.
    pub fn join(&mut self, position: Vec3, roles: ViewerRoles) -> ConnectionId {
        let id = self.allocate_connection();
        let entity = self.spawn(position, Some(id));
        self.connections.insert(
            id,
            SimConnection {
                controlled: Some(entity),
                authenticated: true,
                roles,
            },
        );
        id
    }

    /// Connect an authenticated viewer that controls no entity.
    pub fn connect_viewer(&mut self, roles: ViewerRoles) -> ConnectionId {
        let id = self.allocate_connection();
        self.connections.insert(
            id,
            SimConnection {
                controlled: None,
                authenticated: true,
                roles,
            },
        );
        id
    }

    /// Connect a client that has not finished authenticating yet.
    pub fn connect_pending(&mut self, position: Vec3) -> ConnectionId {
        let id = self.join(position, ViewerRoles::NONE);
        if let Some(conn) = self.connections.get_mut(&id) {
            conn.authenticated = false;
        }
        id
    }

    pub fn authenticate(&mut self, id: ConnectionId) -> Result<(), SimError> {
        let conn = self
            .connections
            .get_mut(&id)
            .ok_or(SimError::UnknownConnection(id))?;
        conn.authenticated = true;
        Ok(())
    }

    pub fn set_roles(&mut self, id: ConnectionId, roles: ViewerRoles) -> Result<(), SimError> {
        let conn = self
            .connections
            .get_mut(&id)
            .ok_or(SimError::UnknownConnection(id))?;
        conn.roles = roles;
        Ok(())
    }

    /// Drop a connection and despawn the entity it controlled.
    pub fn disconnect(&mut self, id: ConnectionId) -> Result<(), SimError> {
        let conn = self
            .connections
            .remove(&id)
            .ok_or(SimError::UnknownConnection(id))?;
        if let Some(entity) = conn.controlled {
            self.entities.remove(&entity);
        }
        tracing::debug!(%id, "connection dropped");
        Ok(())
    }

    pub fn spawn(&mut self, position: Vec3, owner: Option<ConnectionId>) -> EntityId {
        let id = EntityId(Uuid::from_u64_pair(self.next_u64(), self.next_u64()));
        self.entities.insert(
            id,
            SimEntity {
                position,
                owner,
                mobile: false,
            },
        );
        id
    }

    pub fn despawn(&mut self, id: EntityId) -> Result<(), SimError> {
        let entity = self
            .entities
            .remove(&id)
            .ok_or(SimError::UnknownEntity(id))?;
        if let Some(conn) = entity.owner.and_then(|o| self.connections.get_mut(&o)) {
            conn.controlled = None;
        }
        Ok(())
    }

    pub fn position(&self, id: EntityId) -> Option<Vec3> {
        self.entities.get(&id).map(|e| e.position)
    }

    pub fn set_position(&mut self, id: EntityId, position: Vec3) -> Result<(), SimError> {
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(SimError::UnknownEntity(id))?;
        entity.position = position;
        Ok(())
    }

    /// Move the entity controlled by `connection`.
    pub fn move_connection(&mut self, connection: ConnectionId, position: Vec3) -> Result<(), SimError> {
        let entity = self
            .controlled_entity(connection)
            .ok_or(SimError::UnknownConnection(connection))?;
        self.set_position(entity, position)
    }

    /// Advance one tick: players and mobile objects wander, clamped to the
    /// world bounds.
    pub fn step(&mut self) {
        self.tick += 1;
        if self.speed <= 0.0 {
            return;
        }
        let ids: Vec<EntityId> = self
            .entities
            .iter()
            .filter(|(_, e)| e.mobile || e.owner.is_some())
            .map(|(id, _)| *id)
            .collect();
        for id in ids {
            let dx = (self.next_unit() * 2.0 - 1.0) * self.speed;
            let dy = (self.next_unit() * 2.0 - 1.0) * self.speed;
            let half = self.half_extent;
            if let Some(e) = self.entities.get_mut(&id) {
                e.position.x = (e.position.x + dx).clamp(-half, half);
                e.position.y = (e.position.y + dy).clamp(-half, half);
            }
        }
    }

    fn allocate_connection(&mut self) -> ConnectionId {
        let id = ConnectionId(self.next_connection);
        self.next_connection += 1;
        id
    }

    fn random_position(&mut self) -> Vec3 {
        let x = (self.next_unit() * 2.0 - 1.0) * self.half_extent;
        let y = (self.next_unit() * 2.0 - 1.0) * self.half_extent;
        Vec3::new(x, y, 0.0)
    }

    fn next_u64(&mut self) -> u64 {
        self.rng = self.rng.wrapping_add(0x9e37_79b9_7f4a_7c15);
        let mut z = self.rng;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^ (z >> 31)
    }

    /// Uniform value in `[0, 1)`.
    fn next_unit(&mut self) -> f32 {
        (self.next_u64() >> 40) as f32 / (1u64 << 24) as f32
    }
}

impl InterestHost for SimWorld {
    fn is_authoritative(&self) -> bool {
        self.authoritative
    }

    fn live_connections(&self) -> impl Iterator<Item = ConnectionSnapshot> + '_ {
        self.connections.iter().map(|(id, conn)| ConnectionSnapshot {
            id: *id,
            position: conn
                .controlled
                .and_then(|e| self.entities.get(&e))
                .map(|e| e.position),
            authenticated: conn.authenticated,
            roles: conn.roles,
        })
    }

    fn entities_needing_observers(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.keys().copied()
    }

    fn entity(&self, id: EntityId) -> Option<EntitySnapshot> {
        self.entities.get(&id).map(|e| EntitySnapshot {
            id,
            position: Some(e.position),
            owner: e.owner,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_world_size() {
        assert_eq!(
            SimWorld::new(1, 0.0).unwrap_err(),
            SimError::InvalidWorldSize(0.0)
        );
    }

    #[test]
    fn generate_populates_counts() {
        let config = SimConfig {
            players: 10,
            admins: 1,
            ghosts: 2,
            cameras: 3,
            objects: 50,
            ..SimConfig::default()
        };
        let world = SimWorld::generate(&config).unwrap();
        assert_eq!(world.connection_count(), 16);
        // cameras control nothing
        assert_eq!(world.entity_count(), 13 + 50);
    }

    #[test]
    fn same_seed_same_world() {
        let config = SimConfig {
            objects: 20,
            players: 5,
            ..SimConfig::default()
        };
        let mut a = SimWorld::generate(&config).unwrap();
        let mut b = SimWorld::generate(&config).unwrap();
        for _ in 0..10 {
            a.step();
            b.step();
        }
        let ids_a: Vec<_> = a.entities_needing_observers().collect();
        let ids_b: Vec<_> = b.entities_needing_observers().collect();
        assert_eq!(ids_a, ids_b);
        for id in ids_a {
            assert_eq!(a.position(id), b.position(id));
        }
    }

    #[test]
    fn connection_position_follows_controlled_entity() {
        let mut world = SimWorld::new(3, 100.0).unwrap();
        let conn = world.join(Vec3::new(1.0, 2.0, 0.0), ViewerRoles::NONE);
        world.move_connection(conn, Vec3::new(7.0, 8.0, 0.0)).unwrap();

        let snap = world.live_connections().next().unwrap();
        assert_eq!(snap.id, conn);
        assert_eq!(snap.position, Some(Vec3::new(7.0, 8.0, 0.0)));
    }

    #[test]
    fn disconnect_despawns_controlled_entity() {
        let mut world = SimWorld::new(3, 100.0).unwrap();
        let conn = world.join(Vec3::ZERO, ViewerRoles::NONE);
        let entity = world.controlled_entity(conn).unwrap();
        world.disconnect(conn).unwrap();
        assert!(world.entity(entity).is_none());
        assert_eq!(
            world.disconnect(conn),
            Err(SimError::UnknownConnection(conn))
        );
    }

    #[test]
    fn despawning_player_entity_leaves_connection_without_position() {
        let mut world = SimWorld::new(3, 100.0).unwrap();
        let conn = world.join(Vec3::ZERO, ViewerRoles::NONE);
        let entity = world.controlled_entity(conn).unwrap();
        world.despawn(entity).unwrap();
        let snap = world.live_connections().next().unwrap();
        assert_eq!(snap.position, None);
    }

    #[test]
    fn pending_connections_are_unauthenticated() {
        let mut world = SimWorld::new(3, 100.0).unwrap();
        let conn = world.connect_pending(Vec3::ZERO);
        assert!(!world.live_connections().next().unwrap().authenticated);
        world.authenticate(conn).unwrap();
        assert!(world.live_connections().next().unwrap().authenticated);
    }

    #[test]
    fn step_stays_in_bounds() {
        let mut world = SimWorld::new(9, 10.0).unwrap();
        world.set_speed(50.0);
        let conn = world.join(Vec3::ZERO, ViewerRoles::NONE);
        let entity = world.controlled_entity(conn).unwrap();
        for _ in 0..20 {
            world.step();
            let p = world.position(entity).unwrap();
            assert!(p.x.abs() <= 5.0 && p.y.abs() <= 5.0);
        }
        assert_eq!(world.tick(), 20);
    }

    #[test]
    fn unknown_entity_errors() {
        let mut world = SimWorld::new(1, 10.0).unwrap();
        let ghost = EntityId::new();
        assert_eq!(
            world.set_position(ghost, Vec3::ZERO),
            Err(SimError::UnknownEntity(ghost))
        );
    }
}
