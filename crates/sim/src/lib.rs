//! Simulated host for interest management.
//!
//! Provides a deterministic world of connections and entities implementing
//! [`InterestHost`], a replication stand-in implementing [`ObserverSink`],
//! and a [`Simulation`] loop tying both to an [`InterestManager`].

mod replication;
mod timer;
mod world;

pub use replication::{ObserverChange, ReplicationStats, ReplicationTracker};
pub use timer::TickTimer;
pub use world::{SimConfig, SimError, SimWorld};

use std::time::Duration;

use vantage_interest::{InterestConfig, InterestHost, InterestManager, ObserverSink};

/// Summary of a simulation run.
#[derive(Debug, Clone, PartialEq)]
pub struct SimReport {
    pub ticks: u64,
    pub connections: usize,
    pub entities: usize,
    pub passes_completed: u64,
    pub max_processed_per_tick: usize,
    pub replication: ReplicationStats,
    pub average_tick_time: Duration,
    pub max_tick_time: Duration,
}

/// A world, its interest manager and a replication tracker stepped together.
#[derive(Debug)]
pub struct Simulation {
    pub world: SimWorld,
    pub manager: InterestManager,
    pub tracker: ReplicationTracker,
    timer: TickTimer,
    max_processed: usize,
}

impl Simulation {
    pub fn new(world: SimWorld, manager: InterestManager) -> Self {
        Self {
            world,
            manager,
            tracker: ReplicationTracker::new(),
            timer: TickTimer::new(256),
            max_processed: 0,
        }
    }

    /// Generate a world from `sim` and a manager from `interest`.
    pub fn generate(sim: &SimConfig, interest: InterestConfig) -> Result<Self, SimError> {
        let world = SimWorld::generate(sim)?;
        let manager = InterestManager::new(interest)?;
        Ok(Self::new(world, manager))
    }

    /// Step the world, then run one interest tick.
    ///
    /// Despawned entities never reach the tracker through the manager, so
    /// whenever a pass finishes the tracker drops entities the world no
    /// longer has.
    pub fn step(&mut self) {
        self.world.step();
        let stats = self.manager.tick(&self.world, &mut self.tracker);
        self.timer.record(stats.tick_time);
        self.max_processed = self.max_processed.max(stats.entities_processed_this_tick);

        if stats.pass_finished_this_tick {
            let world = &self.world;
            let pruned = self
                .tracker
                .retain_entities(|id| world.entity(id).is_some());
            if pruned > 0 {
                tracing::debug!(pruned, "dropped despawned entities from tracker");
            }
        }
    }

    pub fn run(&mut self, ticks: u64) -> SimReport {
        let _span = tracing::info_span!("simulation", ticks).entered();
        for _ in 0..ticks {
            self.step();
        }
        self.report()
    }

    pub fn report(&self) -> SimReport {
        SimReport {
            ticks: self.world.tick(),
            connections: self.world.connection_count(),
            entities: self.world.entity_count(),
            passes_completed: self.manager.scheduler().passes_completed(),
            max_processed_per_tick: self.max_processed,
            replication: self.tracker.stats(),
            average_tick_time: self.timer.average(),
            max_tick_time: self.timer.max(),
        }
    }
}

/// Run `ticks` ticks of `manager` against `host` without moving anything.
///
/// Handy for tests that script the world by hand between calls.
pub fn drive<H, S>(manager: &mut InterestManager, host: &H, sink: &mut S, ticks: usize)
where
    H: InterestHost,
    S: ObserverSink,
{
    for _ in 0..ticks {
        manager.tick(host, sink);
    }
}
