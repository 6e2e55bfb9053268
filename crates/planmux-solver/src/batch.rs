//! Immediate-batch selection
//!
//! Walks the ordered task list and admits a task iff the batch is below the
//! parallelism cap, its prerequisites are already in the batch or reported
//! complete by the caller (the batch is dependency-closed upward), and its
//! files are disjoint from everything already claimed. Tasks the caller
//! reports complete are passed over entirely and claim nothing. Tasks
//! failing the dependency or file check are skipped; the walk stops at the
//! first task rejected solely by the cap.

use crate::graph::DepGraph;
use planmux_core::{Task, TaskId};
use std::collections::{BTreeSet, HashSet};

pub(crate) fn select_batch(
    tasks: &[Task],
    graph: &DepGraph,
    order: &[usize],
    completed: &BTreeSet<TaskId>,
    max_parallel: usize,
) -> Vec<usize> {
    let mut batch: Vec<usize> = Vec::new();
    let mut in_batch: HashSet<usize> = HashSet::new();
    let mut claimed: HashSet<&str> = HashSet::new();

    for &handle in order {
        if completed.contains(graph.id(handle).as_str()) {
            continue; // already done elsewhere, nothing to dispatch
        }

        let deps_satisfied = graph.deps_of(handle).iter().all(|&dep| {
            in_batch.contains(&dep) || completed.contains(graph.id(dep).as_str())
        });
        if !deps_satisfied {
            continue;
        }

        let files_free = tasks[handle]
            .affected_files
            .iter()
            .all(|file| !claimed.contains(file.as_str()));
        if !files_free {
            continue;
        }

        if batch.len() >= max_parallel {
            break; // admissible but out of slots
        }

        batch.push(handle);
        in_batch.insert(handle);
        claimed.extend(tasks[handle].affected_files.iter().map(String::as_str));
    }

    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn batch_ids(tasks: &[Task], completed: &[&str], max_parallel: usize) -> Vec<String> {
        let graph = DepGraph::build(tasks);
        let order = graph.topological_order().unwrap();
        let completed: BTreeSet<String> = completed.iter().map(|s| s.to_string()).collect();
        select_batch(tasks, &graph, &order, &completed, max_parallel)
            .into_iter()
            .map(|h| graph.id(h).clone())
            .collect()
    }

    #[test]
    fn conflicting_task_is_skipped_not_terminal() {
        let tasks = vec![
            Task::new("t1", "A").file("a"),
            Task::new("t2", "B").file("b"),
            Task::new("t3", "C").files(["a", "c"]),
        ];
        assert_eq!(batch_ids(&tasks, &[], 3), vec!["t1", "t2"]);
    }

    #[test]
    fn unmet_prerequisite_excludes_the_dependent() {
        let tasks = vec![
            Task::new("t1", "A").file("auth"),
            Task::new("t2", "B").depends_on("t1").files(["auth", "routes"]),
            Task::new("t3", "C").depends_on("t1").files(["auth", "routes"]),
        ];
        // t2/t3 conflict with t1 on files anyway; only t1 enters
        assert_eq!(batch_ids(&tasks, &[], 5), vec!["t1"]);
    }

    #[test]
    fn prerequisite_inside_the_batch_counts() {
        let tasks = vec![
            Task::new("t1", "A").file("a"),
            Task::new("t2", "B").depends_on("t1").file("b"),
        ];
        assert_eq!(batch_ids(&tasks, &[], 5), vec!["t1", "t2"]);
    }

    #[test]
    fn completed_tasks_are_passed_over_and_release_their_files() {
        let tasks = vec![
            Task::new("done", "Done").file("shared"),
            Task::new("blocked", "Blocked").file("shared"),
            Task::new("next", "Next").depends_on("done").file("y"),
        ];
        // Without the completion report "done" claims the shared file
        assert_eq!(batch_ids(&tasks, &[], 5), vec!["done", "next"]);
        // With it, "done" is skipped, freeing the file and satisfying "next"
        assert_eq!(batch_ids(&tasks, &["done"], 5), vec!["blocked", "next"]);
    }

    #[test]
    fn cap_stops_the_walk_at_first_admissible_reject() {
        let tasks = vec![
            Task::new("t1", "A").file("a"),
            Task::new("t2", "B").file("b"),
            Task::new("t3", "C").file("c"),
        ];
        assert_eq!(batch_ids(&tasks, &[], 2), vec!["t1", "t2"]);
    }

    #[test]
    fn out_of_order_ready_tasks_fill_remaining_slots() {
        // t2 is skipped (conflicts with t1); t3 later in the order still fits
        let tasks = vec![
            Task::new("t1", "A")
                .priority(planmux_core::Priority::Major)
                .file("a"),
            Task::new("t2", "B").files(["a", "b"]),
            Task::new("t3", "C").file("c"),
        ];
        assert_eq!(batch_ids(&tasks, &[], 3), vec!["t1", "t3"]);
    }

    #[test]
    fn empty_order_selects_nothing() {
        let tasks: Vec<Task> = Vec::new();
        assert_eq!(batch_ids(&tasks, &[], 5), Vec::<String>::new());
    }
}
