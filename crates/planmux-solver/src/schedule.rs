//! Schedule solving
//!
//! The model is one integer start time per task with `end = start +
//! estimate_hours`, a precedence constraint `start(T) >= end(U)` for every
//! dependency T -> U, and makespan (`max end`) as the objective. Start times
//! are not resource-constrained; physical parallelism is handled by the
//! batch selector.
//!
//! The forward pass below assigns every task its earliest start, which is
//! the makespan-optimal solution for this model. With the
//! `optimal-schedule` feature the same model is handed to the Pumpkin
//! constraint solver under a wall-clock budget, falling back to the forward
//! pass when the search returns nothing in time.
//!
//! Candidate paths are produced by re-linearizing the solved start times
//! with rotated objective tie-breaks (speed, urgency, coverage). Each
//! linearization runs Kahn's algorithm keyed by (start, rotation key,
//! priority, id), so a zero-duration prerequisite that ties with its
//! dependent can never be emitted after it.

use crate::graph::DepGraph;
use crate::score;
use planmux_core::{CancelToken, Goal, SystemClock, Task, TaskId};
use planmux_core::Clock;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::Duration;

/// Knobs for the schedule solver
#[derive(Clone, Debug)]
pub struct SolveOptions {
    /// Soft wall-clock budget for the constraint search
    pub deadline: Duration,
    /// Search seed; current strategies are deterministic regardless
    pub seed: u64,
    /// Snapshot of "now", used for urgency scoring and availability
    pub now_unix_ms: i64,
    /// Cooperative cancellation, checked before and between resolves
    pub cancel: CancelToken,
}

impl SolveOptions {
    /// Options pinned to an explicit instant (tests, replays)
    pub fn at(now_unix_ms: i64) -> Self {
        Self {
            deadline: Duration::from_secs(10),
            seed: 0,
            now_unix_ms,
            cancel: CancelToken::new(),
        }
    }

    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self::at(SystemClock.now_unix_ms())
    }
}

/// One solved candidate: a dependency-respecting linearization plus the
/// makespan of the underlying start assignment.
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate {
    pub order: Vec<usize>,
    pub makespan: u32,
}

/// Objective rotations used to derive distinct candidate orderings
#[derive(Clone, Copy, Debug)]
enum Rotation {
    Speed,
    Urgency,
    Coverage,
}

const ROTATIONS: [Rotation; 3] = [Rotation::Speed, Rotation::Urgency, Rotation::Coverage];

/// Start-time solver over a validated dependency graph
pub struct ScheduleSolver<'a> {
    tasks: &'a [Task],
    graph: &'a DepGraph,
}

impl<'a> ScheduleSolver<'a> {
    pub fn new(tasks: &'a [Task], graph: &'a DepGraph) -> Self {
        Self { tasks, graph }
    }

    /// Produce candidate orderings. Returns the candidates found before the
    /// cancellation token flipped; empty when cancelled at the outset.
    pub fn solve(&self, topo: &[usize], goals: &[Goal], opts: &SolveOptions) -> Vec<Candidate> {
        if opts.cancel.is_cancelled() {
            return Vec::new();
        }

        let (starts, makespan) = self.compute_starts(topo, opts);

        let goal_priority: HashMap<&str, i32> =
            goals.iter().map(|g| (g.id.as_str(), g.priority)).collect();

        let mut candidates: Vec<Candidate> = Vec::new();
        for rotation in ROTATIONS {
            if opts.cancel.is_cancelled() {
                break;
            }
            let order = self.linearize(&starts, rotation, &goal_priority, opts.now_unix_ms);
            if !candidates.iter().any(|c| c.order == order) {
                candidates.push(Candidate { order, makespan });
            }
        }
        candidates
    }

    /// Solved start times plus makespan. The CP backend runs first when the
    /// `optimal-schedule` feature is enabled.
    fn compute_starts(&self, topo: &[usize], opts: &SolveOptions) -> (Vec<u32>, u32) {
        #[cfg(feature = "optimal-schedule")]
        if let Some(starts) = crate::cp::minimize_makespan(self.tasks, self.graph, opts) {
            let makespan = starts
                .iter()
                .zip(self.tasks.iter())
                .map(|(&s, t)| s.saturating_add(t.estimate_hours))
                .max()
                .unwrap_or(0);
            return (starts, makespan);
        }

        let _ = opts;
        self.forward_starts(topo)
    }

    /// Earliest-start assignment: `es(T) = max over prerequisites of
    /// es(U) + duration(U)`, walked in topological order.
    fn forward_starts(&self, topo: &[usize]) -> (Vec<u32>, u32) {
        let mut starts: Vec<u32> = vec![0; self.tasks.len()];
        let mut makespan: u32 = 0;

        for &handle in topo {
            let earliest = self
                .graph
                .deps_of(handle)
                .iter()
                .map(|&dep| starts[dep].saturating_add(self.tasks[dep].estimate_hours))
                .max()
                .unwrap_or(0);
            starts[handle] = earliest;
            makespan = makespan.max(earliest.saturating_add(self.tasks[handle].estimate_hours));
        }

        (starts, makespan)
    }

    /// Kahn linearization keyed by (start asc, rotation key desc, priority
    /// desc, id asc).
    fn linearize(
        &self,
        starts: &[u32],
        rotation: Rotation,
        goal_priority: &HashMap<&str, i32>,
        now_unix_ms: i64,
    ) -> Vec<usize> {
        let rotation_key = |handle: usize| -> i64 {
            let task = &self.tasks[handle];
            match rotation {
                Rotation::Speed => 0,
                Rotation::Urgency => task
                    .due_date
                    .map(|due| score::due_urgency_points(due.timestamp_millis(), now_unix_ms) as i64)
                    .unwrap_or(0),
                Rotation::Coverage => task
                    .goal_id
                    .as_deref()
                    .and_then(|g| goal_priority.get(g))
                    .map(|&p| i64::from(p))
                    .unwrap_or(0),
            }
        };

        type Key = (Reverse<u32>, i64, u8, Reverse<TaskId>, usize);
        let key_of = |handle: usize, starts: &[u32], rot: i64| -> Key {
            (
                Reverse(starts[handle]),
                rot,
                self.tasks[handle].priority.value(),
                Reverse(self.tasks[handle].id.clone()),
                handle,
            )
        };

        let mut in_degree: Vec<usize> = (0..self.tasks.len())
            .map(|h| self.graph.deps_of(h).len())
            .collect();
        let mut ready: BinaryHeap<Key> = BinaryHeap::new();
        for (handle, &degree) in in_degree.iter().enumerate() {
            if degree == 0 {
                ready.push(key_of(handle, starts, rotation_key(handle)));
            }
        }

        let mut order = Vec::with_capacity(self.tasks.len());
        while let Some((_, _, _, _, handle)) = ready.pop() {
            order.push(handle);
            for &dependent in self.graph.blocks_of(handle) {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.push(key_of(dependent, starts, rotation_key(dependent)));
                }
            }
        }

        order
    }
}
