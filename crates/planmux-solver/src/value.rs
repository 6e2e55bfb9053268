//! Value-impact analysis
//!
//! For each task, the transitive set of tasks it blocks (iterative stack
//! traversal over the reverse adjacency), the hours and goals tied up in
//! that set, and a composite 0-100 score:
//!
//! ```text
//! score = 40 * (|transitive| / N_tasks)
//!       + 40 * (blocked_hours / H_total)
//!       + 20 * (|blocked_goals| / N_goals)
//! ```
//!
//! A zero denominator contributes zero. Scores are rounded to one decimal
//! and clamped to [0, 100].

use crate::graph::DepGraph;
use planmux_core::{Goal, Task, ValueImpact};
use std::collections::HashSet;

/// Compute value impacts for every task, in request order.
pub fn analyze(tasks: &[Task], goals: &[Goal], graph: &DepGraph) -> Vec<ValueImpact> {
    let total_tasks = tasks.len();
    let total_hours: u64 = tasks.iter().map(|t| u64::from(t.estimate_hours)).sum();
    let total_goals = goals.len();

    // Goal task sets resolved to handles once
    let goal_members: Vec<(&str, HashSet<usize>)> = goals
        .iter()
        .map(|g| {
            let members = g
                .tasks
                .iter()
                .filter_map(|id| graph.handle(id))
                .collect::<HashSet<usize>>();
            (g.id.as_str(), members)
        })
        .collect();

    tasks
        .iter()
        .enumerate()
        .map(|(handle, task)| {
            let transitive = transitive_blockers(graph, handle);

            let blocked_hours: u64 = transitive
                .iter()
                .map(|&h| u64::from(tasks[h].estimate_hours))
                .sum();

            let mut blocked_goals: Vec<String> = goal_members
                .iter()
                .filter(|(_, members)| members.iter().any(|h| transitive.contains(h)))
                .map(|(id, _)| (*id).to_string())
                .collect();
            blocked_goals.sort();

            let mut score = 0.0;
            if total_tasks > 0 {
                score += 40.0 * (transitive.len() as f64 / total_tasks as f64);
            }
            if total_hours > 0 {
                score += 40.0 * (blocked_hours as f64 / total_hours as f64);
            }
            if total_goals > 0 {
                score += 20.0 * (blocked_goals.len() as f64 / total_goals as f64);
            }
            let score = ((score * 10.0).round() / 10.0).clamp(0.0, 100.0);

            let mut blocked_tasks: Vec<String> =
                transitive.iter().map(|&h| graph.id(h).clone()).collect();
            blocked_tasks.sort();

            ValueImpact {
                task_id: task.id.clone(),
                summary: task.summary.clone(),
                priority: task.priority,
                direct_blockers: graph.blocks_of(handle).len(),
                blocked_tasks,
                blocked_hours: blocked_hours.min(u64::from(u32::MAX)) as u32,
                blocked_goals,
                value_score: score,
            }
        })
        .collect()
}

/// Tasks reachable from `handle` through the reverse dependency relation,
/// excluding the task itself.
fn transitive_blockers(graph: &DepGraph, handle: usize) -> HashSet<usize> {
    let mut reached: HashSet<usize> = HashSet::new();
    let mut stack: Vec<usize> = graph.blocks_of(handle).to_vec();

    while let Some(current) = stack.pop() {
        if current != handle && reached.insert(current) {
            stack.extend_from_slice(graph.blocks_of(current));
        }
    }

    reached
}

/// Sort impacts by score descending, id ascending, keeping the first `limit`.
pub fn highest_value(mut impacts: Vec<ValueImpact>, limit: usize) -> Vec<ValueImpact> {
    impacts.sort_by(|a, b| {
        b.value_score
            .partial_cmp(&a.value_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.task_id.cmp(&b.task_id))
    });
    impacts.truncate(limit);
    impacts
}

#[cfg(test)]
mod tests {
    use super::*;
    use planmux_core::{Goal, Task};
    use pretty_assertions::assert_eq;

    fn chain() -> (Vec<Task>, Vec<Goal>) {
        let tasks = vec![
            Task::new("t1", "Root").estimate_hours(8),
            Task::new("t2", "Mid").estimate_hours(4).depends_on("t1"),
            Task::new("t3", "Leaf").estimate_hours(2).depends_on("t2"),
        ];
        let goals = vec![Goal::new("g1", "Goal").with_tasks(["t1", "t2", "t3"])];
        (tasks, goals)
    }

    #[test]
    fn root_of_chain_blocks_everything_downstream() {
        let (tasks, goals) = chain();
        let graph = DepGraph::build(&tasks);
        let impacts = analyze(&tasks, &goals, &graph);

        let root = &impacts[0];
        assert_eq!(root.direct_blockers, 1);
        assert_eq!(root.blocked_tasks, vec!["t2", "t3"]);
        assert_eq!(root.blocked_hours, 6);
        assert_eq!(root.blocked_goals, vec!["g1"]);
        // 40*(2/3) + 40*(6/14) + 20*(1/1) = 63.8 to one decimal
        assert_eq!(root.value_score, 63.8);
    }

    #[test]
    fn leaf_task_scores_zero() {
        let (tasks, goals) = chain();
        let graph = DepGraph::build(&tasks);
        let impacts = analyze(&tasks, &goals, &graph);

        let leaf = &impacts[2];
        assert!(leaf.blocked_tasks.is_empty());
        assert_eq!(leaf.blocked_hours, 0);
        assert!(leaf.blocked_goals.is_empty());
        assert_eq!(leaf.value_score, 0.0);
    }

    #[test]
    fn diamond_counts_each_descendant_once() {
        let tasks = vec![
            Task::new("root", "R").estimate_hours(1),
            Task::new("left", "L").estimate_hours(2).depends_on("root"),
            Task::new("right", "Rt").estimate_hours(3).depends_on("root"),
            Task::new("join", "J")
                .estimate_hours(4)
                .depends_on("left")
                .depends_on("right"),
        ];
        let graph = DepGraph::build(&tasks);
        let impacts = analyze(&tasks, &[], &graph);

        assert_eq!(impacts[0].blocked_tasks, vec!["join", "left", "right"]);
        assert_eq!(impacts[0].blocked_hours, 9);
    }

    #[test]
    fn blocked_goals_require_a_blocked_member() {
        // t1 blocks t2 which belongs to g2; t1's own goal g1 has no other
        // member downstream of t1, so only g2 is blocked.
        let tasks = vec![
            Task::new("t1", "A").goal("g1"),
            Task::new("t2", "B").goal("g2").depends_on("t1"),
        ];
        let goals = vec![
            Goal::new("g1", "One").with_tasks(["t1"]),
            Goal::new("g2", "Two").with_tasks(["t2"]),
        ];
        let graph = DepGraph::build(&tasks);
        let impacts = analyze(&tasks, &goals, &graph);
        assert_eq!(impacts[0].blocked_goals, vec!["g2"]);
    }

    #[test]
    fn highest_value_sorts_desc_with_id_tiebreak() {
        let (tasks, goals) = chain();
        let graph = DepGraph::build(&tasks);
        let impacts = analyze(&tasks, &goals, &graph);
        let ranked = highest_value(impacts, 10);

        let ids: Vec<&str> = ranked.iter().map(|i| i.task_id.as_str()).collect();
        assert_eq!(ids, vec!["t1", "t2", "t3"]);

        let ranked = highest_value(analyze(&tasks, &goals, &graph), 2);
        assert_eq!(ranked.len(), 2);
    }

    #[test]
    fn zero_denominators_contribute_zero() {
        let tasks = vec![
            Task::new("a", "A").estimate_hours(0),
            Task::new("b", "B").estimate_hours(0).depends_on("a"),
        ];
        let graph = DepGraph::build(&tasks);
        let impacts = analyze(&tasks, &[], &graph);
        // Only the task-count term applies: 40 * (1/2)
        assert_eq!(impacts[0].value_score, 20.0);
    }
}
