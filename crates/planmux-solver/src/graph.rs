//! Dependency graph construction and validation
//!
//! Tasks live in an arena indexed by integer handle; external ids are
//! interned at build time. Both the forward (`deps`) and reverse (`blocks`)
//! adjacency tables operate on handles, which keeps the transitive-closure
//! and topological-sort code free of string churn and pointer cycles.

use planmux_core::{PlanError, Priority, Task, TaskId};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

/// Flat dependency graph over interned task handles
#[derive(Debug)]
pub struct DepGraph {
    /// handle -> task id
    ids: Vec<TaskId>,
    /// handle -> priority (for ordering tie breaks)
    priorities: Vec<Priority>,
    /// task id -> handle
    index: HashMap<TaskId, usize>,
    /// handle -> prerequisite handles
    deps: Vec<Vec<usize>>,
    /// handle -> dependent handles (reverse of `deps`)
    blocks: Vec<Vec<usize>>,
}

impl DepGraph {
    /// Build the graph from the request's tasks.
    ///
    /// Edges whose prerequisite id is unknown are silently dropped; repeated
    /// declarations of the same edge collapse to one.
    pub fn build(tasks: &[Task]) -> Self {
        let ids: Vec<TaskId> = tasks.iter().map(|t| t.id.clone()).collect();
        let priorities: Vec<Priority> = tasks.iter().map(|t| t.priority).collect();
        let index: HashMap<TaskId, usize> = ids
            .iter()
            .enumerate()
            .map(|(h, id)| (id.clone(), h))
            .collect();

        let mut deps: Vec<Vec<usize>> = vec![Vec::new(); tasks.len()];
        let mut blocks: Vec<Vec<usize>> = vec![Vec::new(); tasks.len()];

        for (handle, task) in tasks.iter().enumerate() {
            let mut seen: HashSet<usize> = HashSet::new();
            for prereq in &task.depends_on {
                if let Some(&dep_handle) = index.get(prereq) {
                    if seen.insert(dep_handle) {
                        deps[handle].push(dep_handle);
                        blocks[dep_handle].push(handle);
                    }
                }
            }
        }

        Self {
            ids,
            priorities,
            index,
            deps,
            blocks,
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Resolve an external id to its handle
    pub fn handle(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// External id for a handle
    pub fn id(&self, handle: usize) -> &TaskId {
        &self.ids[handle]
    }

    /// Prerequisite handles of a task
    pub fn deps_of(&self, handle: usize) -> &[usize] {
        &self.deps[handle]
    }

    /// Handles of tasks directly blocked by a task
    pub fn blocks_of(&self, handle: usize) -> &[usize] {
        &self.blocks[handle]
    }

    /// Kahn's algorithm with a priority-first tie break: among unblocked
    /// nodes the highest priority is emitted first, ties resolved by the
    /// insertion order of the source data.
    pub fn topological_order(&self) -> Result<Vec<usize>, PlanError> {
        let mut in_degree: Vec<usize> = self.deps.iter().map(Vec::len).collect();

        // Max-heap key: (priority value, earliest insertion first)
        let mut ready: BinaryHeap<(u8, Reverse<usize>)> = BinaryHeap::new();
        for (handle, &degree) in in_degree.iter().enumerate() {
            if degree == 0 {
                ready.push((self.priorities[handle].value(), Reverse(handle)));
            }
        }

        let mut order = Vec::with_capacity(self.len());
        while let Some((_, Reverse(handle))) = ready.pop() {
            order.push(handle);
            for &dependent in &self.blocks[handle] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.push((self.priorities[dependent].value(), Reverse(dependent)));
                }
            }
        }

        if order.len() != self.len() {
            let emitted: HashSet<usize> = order.iter().copied().collect();
            let remaining: HashSet<usize> =
                (0..self.len()).filter(|h| !emitted.contains(h)).collect();
            return Err(PlanError::CycleDetected {
                cycle: self.extract_cycle(&remaining),
            });
        }

        Ok(order)
    }

    /// Walk prerequisite edges inside the unresolved set until a node
    /// repeats; the slice from its first visit is one witnessing cycle.
    fn extract_cycle(&self, remaining: &HashSet<usize>) -> Vec<TaskId> {
        let start = match remaining.iter().min() {
            Some(&h) => h,
            None => return Vec::new(),
        };

        let mut seen_at: HashMap<usize, usize> = HashMap::new();
        let mut path: Vec<usize> = Vec::new();
        let mut current = start;

        loop {
            if let Some(&position) = seen_at.get(&current) {
                return path[position..]
                    .iter()
                    .map(|&h| self.ids[h].clone())
                    .collect();
            }
            seen_at.insert(current, path.len());
            path.push(current);

            // Every unresolved node keeps at least one unresolved prerequisite
            current = match self.deps[current]
                .iter()
                .copied()
                .find(|h| remaining.contains(h))
            {
                Some(next) => next,
                None => return path.iter().map(|&h| self.ids[h].clone()).collect(),
            };
        }
    }
}
