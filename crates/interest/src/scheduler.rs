use vantage_common::EntityId;

/// Resumable position inside an in-flight rebuild pass.
#[derive(Debug, Clone)]
pub struct RebuildCursor {
    pass: u64,
    pending: Vec<EntityId>,
    next: usize,
    since_yield: usize,
}

impl RebuildCursor {
    /// Sequence number of the pass this cursor belongs to, starting at 1.
    pub fn pass(&self) -> u64 {
        self.pass
    }

    /// Entities handled so far in this pass.
    pub fn processed(&self) -> usize {
        self.next
    }

    /// Entities still waiting in this pass.
    pub fn remaining(&self) -> usize {
        self.pending.len() - self.next
    }

    /// Entities handled since the last suspension point.
    pub fn since_yield(&self) -> usize {
        self.since_yield
    }
}

/// Scheduler state. At most one pass is in flight.
#[derive(Debug, Clone, Default)]
pub enum RebuildState {
    #[default]
    Idle,
    Running(RebuildCursor),
}

/// Outcome of one scheduling quantum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantumReport {
    pub pass: u64,
    pub processed: usize,
    /// The pass consumed its snapshot and the scheduler is idle again.
    pub finished: bool,
}

/// Walks a snapshot of entities in bounded slices, one slice per quantum.
///
/// A pass always runs to completion once started; requests to start another
/// pass while one is running are ignored.
#[derive(Debug, Clone)]
pub struct RebuildScheduler {
    budget: usize,
    state: RebuildState,
    passes_started: u64,
    passes_completed: u64,
}

impl RebuildScheduler {
    /// Create an idle scheduler processing at most `budget` entities per quantum.
    pub fn new(budget: usize) -> Self {
        assert!(budget > 0, "quantum budget must be positive");
        Self {
            budget,
            state: RebuildState::Idle,
            passes_started: 0,
            passes_completed: 0,
        }
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Change the per-quantum budget. Applies from the next quantum on,
    /// including to a pass already in flight.
    pub fn set_budget(&mut self, budget: usize) {
        assert!(budget > 0, "quantum budget must be positive");
        self.budget = budget;
    }

    pub fn state(&self) -> &RebuildState {
        &self.state
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, RebuildState::Running(_))
    }

    pub fn cursor(&self) -> Option<&RebuildCursor> {
        match &self.state {
            RebuildState::Running(cursor) => Some(cursor),
            RebuildState::Idle => None,
        }
    }

    pub fn passes_started(&self) -> u64 {
        self.passes_started
    }

    pub fn passes_completed(&self) -> u64 {
        self.passes_completed
    }

    /// Start a pass over `snapshot`. Returns `false` and leaves the running
    /// pass untouched if one is already in flight.
    pub fn begin(&mut self, snapshot: Vec<EntityId>) -> bool {
        if self.is_running() {
            return false;
        }
        self.passes_started += 1;
        self.state = RebuildState::Running(RebuildCursor {
            pass: self.passes_started,
            pending: snapshot,
            next: 0,
            since_yield: 0,
        });
        true
    }

    /// Run one quantum: hand up to `budget` entities of the in-flight pass
    /// to `process`, then suspend.
    ///
    /// Returns `None` when idle.
    pub fn run_quantum<F>(&mut self, mut process: F) -> Option<QuantumReport>
    where
        F: FnMut(EntityId),
    {
        let RebuildState::Running(cursor) = &mut self.state else {
            return None;
        };

        while cursor.since_yield < self.budget && cursor.next < cursor.pending.len() {
            process(cursor.pending[cursor.next]);
            cursor.next += 1;
            cursor.since_yield += 1;
        }

        let report = QuantumReport {
            pass: cursor.pass,
            processed: cursor.since_yield,
            finished: cursor.next == cursor.pending.len(),
        };
        cursor.since_yield = 0;

        if report.finished {
            self.state = RebuildState::Idle;
            self.passes_completed += 1;
        }
        Some(report)
    }
}
