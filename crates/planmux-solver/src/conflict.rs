//! File-conflict index
//!
//! Two tasks conflict iff they touch at least one common file. Paths are
//! compared by case-sensitive equality; any normalization is the caller's
//! responsibility.

use crate::graph::DepGraph;
use planmux_core::{Task, TaskId};
use std::collections::{BTreeSet, HashMap};

/// Pairwise file-conflict relation over task handles
#[derive(Debug)]
pub struct ConflictIndex {
    /// file path -> handles of tasks touching it
    by_file: HashMap<String, Vec<usize>>,
    /// handle -> handles it conflicts with
    conflicts: Vec<BTreeSet<usize>>,
}

impl ConflictIndex {
    pub fn build(tasks: &[Task], graph: &DepGraph) -> Self {
        let mut by_file: HashMap<String, Vec<usize>> = HashMap::new();
        for (handle, task) in tasks.iter().enumerate() {
            for file in &task.affected_files {
                let entry = by_file.entry(file.clone()).or_default();
                if !entry.contains(&handle) {
                    entry.push(handle);
                }
            }
        }

        let mut conflicts: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); graph.len()];
        for handles in by_file.values() {
            if handles.len() < 2 {
                continue;
            }
            for &a in handles {
                for &b in handles {
                    if a != b {
                        conflicts[a].insert(b);
                    }
                }
            }
        }

        Self { by_file, conflicts }
    }

    /// Handles conflicting with the given task
    pub fn conflicts_of(&self, handle: usize) -> &BTreeSet<usize> {
        &self.conflicts[handle]
    }

    /// Ids of tasks sharing a file with the given task
    pub fn conflicting_ids(&self, graph: &DepGraph, id: &str) -> BTreeSet<TaskId> {
        graph
            .handle(id)
            .map(|h| {
                self.conflicts[h]
                    .iter()
                    .map(|&other| graph.id(other).clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// True when no two members of the batch share a file
    pub fn conflict_free(&self, batch: &[usize]) -> bool {
        for (i, &a) in batch.iter().enumerate() {
            for &b in &batch[i + 1..] {
                if self.conflicts[a].contains(&b) {
                    return false;
                }
            }
        }
        true
    }

    /// Number of distinct files in the index
    pub fn file_count(&self) -> usize {
        self.by_file.len()
    }
}
