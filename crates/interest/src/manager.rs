use std::collections::HashSet;
use std::time::{Duration, Instant};

use vantage_common::{ConnectionId, ConnectionSnapshot, EntityId, EntitySnapshot};

use crate::config::{ConfigError, InterestConfig};
use crate::policy::ObserverPolicy;
use crate::scheduler::{QuantumReport, RebuildScheduler};
use crate::viewers::ViewerTable;

/// The world the interest manager serves.
///
/// Implemented by the host simulation; all methods are read-only views of
/// state the manager never owns.
pub trait InterestHost {
    /// Only the authoritative instance computes observers.
    fn is_authoritative(&self) -> bool {
        true
    }

    /// Every connection currently known to the transport.
    fn live_connections(&self) -> impl Iterator<Item = ConnectionSnapshot> + '_;

    /// Entities that need an observer set. Captured once per rebuild pass.
    fn entities_needing_observers(&self) -> impl Iterator<Item = EntityId> + '_;

    /// Current state of an entity, or `None` once it has been despawned.
    fn entity(&self, id: EntityId) -> Option<EntitySnapshot>;
}

/// Receives finished observer sets, typically the replication layer.
pub trait ObserverSink {
    /// Called once per entity per rebuild pass with its complete observer
    /// set. The set is only borrowed for the duration of the call.
    fn observers_computed(&mut self, entity: EntityId, observers: &HashSet<ConnectionId>);
}

impl<F> ObserverSink for F
where
    F: FnMut(EntityId, &HashSet<ConnectionId>),
{
    fn observers_computed(&mut self, entity: EntityId, observers: &HashSet<ConnectionId>) {
        self(entity, observers)
    }
}

/// Per-tick interest statistics for instrumentation.
#[derive(Debug, Clone, Default)]
pub struct InterestStats {
    pub tick: u64,
    pub authoritative: bool,
    pub connections_in_grid: usize,
    pub occupied_cells: usize,
    /// Entities whose observer set was computed and handed to the sink.
    pub entities_processed_this_tick: usize,
    /// Entities of the pass that were despawned before their turn came.
    /// They still use up budget, so processed plus skipped never exceeds
    /// `entities_per_quantum`.
    pub entities_skipped_this_tick: usize,
    pub pass_started_this_tick: bool,
    pub pass_finished_this_tick: bool,
    pub pass_in_flight: bool,
    pub passes_completed: u64,
    pub tick_time: Duration,
}

/// Drives the spatial grid and the budgeted observer rebuild.
///
/// Call [`InterestManager::tick`] once per simulation tick. Every tick the
/// grid is rebuilt from the live connections; observer sets are recomputed
/// by a rebuild pass that spans as many ticks as its budget requires.
#[derive(Debug)]
pub struct InterestManager {
    config: InterestConfig,
    pending_config: Option<InterestConfig>,
    policy: ObserverPolicy,
    viewers: ViewerTable,
    scheduler: RebuildScheduler,
    scratch: HashSet<ConnectionId>,
    stats: InterestStats,
    ticks: u64,
}

impl InterestManager {
    pub fn new(config: InterestConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            policy: ObserverPolicy::new(config.projector(), config.remote_viewers_see_world),
            scheduler: RebuildScheduler::new(config.entities_per_quantum),
            viewers: ViewerTable::new(),
            scratch: HashSet::new(),
            stats: InterestStats::default(),
            pending_config: None,
            ticks: 0,
            config,
        })
    }

    /// Active configuration. A config passed to [`Self::reconfigure`] becomes
    /// active at the start of the next tick.
    pub fn config(&self) -> &InterestConfig {
        &self.config
    }

    /// Queue a new configuration for the next tick.
    ///
    /// Invalid configurations are rejected and the current one stays.
    pub fn reconfigure(&mut self, config: InterestConfig) -> Result<(), ConfigError> {
        if let Err(err) = config.validate() {
            tracing::warn!(%err, "rejecting interest config");
            return Err(err);
        }
        self.pending_config = Some(config);
        Ok(())
    }

    pub fn policy(&self) -> &ObserverPolicy {
        &self.policy
    }

    pub fn viewers(&self) -> &ViewerTable {
        &self.viewers
    }

    pub fn scheduler(&self) -> &RebuildScheduler {
        &self.scheduler
    }

    pub fn is_rebuilding(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Statistics from the last tick.
    pub fn stats(&self) -> &InterestStats {
        &self.stats
    }

    /// Advance interest management by one tick.
    ///
    /// Rebuilds the grid, starts a rebuild pass if none is in flight and runs
    /// one quantum of the in-flight pass, handing each finished set to
    /// `sink`. Does nothing on a non-authoritative host.
    pub fn tick<H, S>(&mut self, host: &H, sink: &mut S) -> &InterestStats
    where
        H: InterestHost,
        S: ObserverSink + ?Sized,
    {
        self.ticks += 1;
        if !host.is_authoritative() {
            self.stats = InterestStats {
                tick: self.ticks,
                ..InterestStats::default()
            };
            return &self.stats;
        }

        let _span = tracing::info_span!("interest_tick", tick = self.ticks).entered();
        let tick_start = Instant::now();

        self.apply_pending_config();
        let placed = self.refresh_grid(host);

        let started = !self.scheduler.is_running() && self.begin_pass(host);

        let mut skipped = 0;
        let report = self.run_quantum(host, sink, &mut skipped);

        self.stats = InterestStats {
            tick: self.ticks,
            authoritative: true,
            connections_in_grid: placed,
            occupied_cells: self.viewers.grid().occupied_cells(),
            entities_processed_this_tick: report.map_or(0, |r| r.processed - skipped),
            entities_skipped_this_tick: skipped,
            pass_started_this_tick: started,
            pass_finished_this_tick: report.is_some_and(|r| r.finished),
            pass_in_flight: self.scheduler.is_running(),
            passes_completed: self.scheduler.passes_completed(),
            tick_time: tick_start.elapsed(),
        };

        tracing::trace!(
            connections = placed,
            processed = self.stats.entities_processed_this_tick,
            in_flight = self.stats.pass_in_flight,
            "interest tick complete"
        );

        &self.stats
    }

    /// Clear the grid and place every authenticated, positioned connection
    /// in it. Returns the number of placements.
    pub fn refresh_grid<H: InterestHost>(&mut self, host: &H) -> usize {
        let projector = *self.policy.projector();
        self.viewers.refresh(&projector, host.live_connections())
    }

    /// Ask for a rebuild pass to start now.
    ///
    /// Returns `false` when a pass is already in flight; the request is
    /// dropped, not queued.
    pub fn request_rebuild<H: InterestHost>(&mut self, host: &H) -> bool {
        if self.scheduler.is_running() {
            tracing::debug!("rebuild already in flight, ignoring request");
            return false;
        }
        self.begin_pass(host)
    }

    /// Whether `connection` should observe `entity` right now, outside the
    /// rebuild cycle (for instance right after `entity` spawned).
    ///
    /// Uses the connections as of the last grid refresh. Unknown entities and
    /// connections are not observers.
    pub fn check_observer<H: InterestHost>(
        &self,
        host: &H,
        entity: EntityId,
        connection: ConnectionId,
    ) -> bool {
        host.entity(entity)
            .is_some_and(|snapshot| self.check_snapshot(&snapshot, connection))
    }

    /// Like [`Self::check_observer`] for an entity the caller already holds.
    pub fn check_snapshot(&self, entity: &EntitySnapshot, connection: ConnectionId) -> bool {
        self.viewers
            .get(connection)
            .is_some_and(|viewer| self.policy.check_observer(entity, viewer))
    }

    /// Compute the observer set of one entity immediately, against the
    /// current grid, without touching the scheduler.
    pub fn observers_of(&self, entity: &EntitySnapshot) -> HashSet<ConnectionId> {
        let mut out = HashSet::new();
        self.policy.rebuild_observers(entity, &self.viewers, &mut out);
        out
    }

    fn apply_pending_config(&mut self) {
        let Some(config) = self.pending_config.take() else {
            return;
        };
        tracing::debug!(
            visibility_range = config.visibility_range,
            entities_per_quantum = config.entities_per_quantum,
            "applying interest config"
        );
        self.policy = ObserverPolicy::new(config.projector(), config.remote_viewers_see_world);
        self.scheduler.set_budget(config.entities_per_quantum);
        self.config = config;
    }

    fn begin_pass<H: InterestHost>(&mut self, host: &H) -> bool {
        let snapshot: Vec<EntityId> = host.entities_needing_observers().collect();
        let entities = snapshot.len();
        let started = self.scheduler.begin(snapshot);
        if started {
            tracing::debug!(
                pass = self.scheduler.passes_started(),
                entities,
                "rebuild pass started"
            );
        }
        started
    }

    fn run_quantum<H, S>(
        &mut self,
        host: &H,
        sink: &mut S,
        skipped: &mut usize,
    ) -> Option<QuantumReport>
    where
        H: InterestHost,
        S: ObserverSink + ?Sized,
    {
        let Self {
            policy,
            viewers,
            scheduler,
            scratch,
            ..
        } = self;

        let report = scheduler.run_quantum(|id| {
            let Some(entity) = host.entity(id) else {
                tracing::trace!(?id, "entity gone before rebuild");
                *skipped += 1;
                return;
            };
            policy.rebuild_observers(&entity, viewers, scratch);
            sink.observers_computed(id, scratch);
        })?;

        tracing::trace!(
            pass = report.pass,
            processed = report.processed,
            "rebuild quantum"
        );
        if report.finished {
            tracing::debug!(pass = report.pass, "rebuild pass finished");
        }
        Some(report)
    }
}
