use std::collections::{HashMap, HashSet};

use vantage_common::{ConnectionId, EntityId};
use vantage_interest::ObserverSink;

/// Running totals of what the replication layer would have sent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplicationStats {
    /// Observer sets received from the interest manager.
    pub sets_received: u64,
    /// (entity, connection) pairs that started observing.
    pub spawns: u64,
    /// (entity, connection) pairs that stopped observing.
    pub despawns: u64,
}

/// Entered/exited connections for one entity between two observer sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObserverChange {
    pub entered: Vec<ConnectionId>,
    pub exited: Vec<ConnectionId>,
}

/// Observer sink standing in for the replication layer: remembers the last
/// set per entity and diffs each new one against it.
#[derive(Debug, Default)]
pub struct ReplicationTracker {
    observers: HashMap<EntityId, HashSet<ConnectionId>>,
    last_change: HashMap<EntityId, ObserverChange>,
    stats: ReplicationStats,
}

impl ReplicationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> ReplicationStats {
        self.stats
    }

    /// Last observer set received for `entity`.
    pub fn observers(&self, entity: EntityId) -> Option<&HashSet<ConnectionId>> {
        self.observers.get(&entity)
    }

    /// Difference produced by the last set received for `entity`.
    pub fn last_change(&self, entity: EntityId) -> Option<&ObserverChange> {
        self.last_change.get(&entity)
    }

    /// Number of entities `connection` currently observes.
    pub fn visible_to(&self, connection: ConnectionId) -> usize {
        self.observers
            .values()
            .filter(|set| set.contains(&connection))
            .count()
    }

    /// Drop state for a despawned entity, counting its observers as despawns.
    pub fn forget(&mut self, entity: EntityId) {
        if let Some(set) = self.observers.remove(&entity) {
            self.stats.despawns += set.len() as u64;
        }
        self.last_change.remove(&entity);
    }

    /// Forget every tracked entity `keep` rejects. Returns how many went.
    pub fn retain_entities<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(EntityId) -> bool,
    {
        let gone: Vec<EntityId> = self
            .observers
            .keys()
            .copied()
            .filter(|id| !keep(*id))
            .collect();
        for id in &gone {
            self.forget(*id);
        }
        gone.len()
    }

    pub fn tracked_entities(&self) -> usize {
        self.observers.len()
    }
}

impl ObserverSink for ReplicationTracker {
    fn observers_computed(&mut self, entity: EntityId, observers: &HashSet<ConnectionId>) {
        let previous = self.observers.entry(entity).or_default();

        let mut change = ObserverChange {
            entered: observers.difference(previous).copied().collect(),
            exited: previous.difference(observers).copied().collect(),
        };
        change.entered.sort();
        change.exited.sort();

        self.stats.sets_received += 1;
        self.stats.spawns += change.entered.len() as u64;
        self.stats.despawns += change.exited.len() as u64;

        if !change.entered.is_empty() || !change.exited.is_empty() {
            tracing::trace!(
                ?entity,
                entered = change.entered.len(),
                exited = change.exited.len(),
                "observers changed"
            );
        }

        previous.clone_from(observers);
        self.last_change.insert(entity, change);
    }
}
