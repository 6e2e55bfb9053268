//! Path scoring, Pareto filtering and recommendation selection
//!
//! Every candidate path gets three 0-100 scores:
//!
//! - **speed**: `100 - 100 * total_hours / (available_hours * 4)` clamped;
//!   the `* 4` is the four-week planning horizon constant.
//! - **coverage**: share of goals fully contained in the sequence.
//! - **urgency**: up to 50 points of due-date urgency, up to 30 of priority
//!   weight, up to 20 proportional to sequence length.

use crate::graph::DepGraph;
use planmux_core::{Goal, ObjectiveWeights, PlanPath, Priority, Task};
use std::collections::HashSet;

/// Weeks of capacity assumed when converting hours into a speed score
const PLANNING_HORIZON_WEEKS: u32 = 4;

const MS_PER_DAY: i64 = 86_400_000;

/// Due-date urgency bucket for a single task
pub(crate) fn due_urgency_points(due_unix_ms: i64, now_unix_ms: i64) -> f64 {
    let days_until = (due_unix_ms - now_unix_ms) / MS_PER_DAY;
    if days_until <= 0 {
        50.0 // overdue
    } else if days_until <= 3 {
        40.0
    } else if days_until <= 7 {
        30.0
    } else if days_until <= 14 {
        20.0
    } else {
        10.0
    }
}

fn priority_urgency_points(priority: Priority) -> f64 {
    match priority {
        Priority::ShowStopper => 30.0,
        Priority::Critical => 24.0,
        Priority::Major => 18.0,
        Priority::Normal => 12.0,
        Priority::Minor => 6.0,
    }
}

/// Assemble a scored `PlanPath` from a solved ordering.
pub(crate) fn build_path(
    tasks: &[Task],
    graph: &DepGraph,
    order: &[usize],
    makespan: u32,
    goals: &[Goal],
    available_hours: u32,
    now_unix_ms: i64,
) -> PlanPath {
    let sequence: Vec<String> = order.iter().map(|&h| graph.id(h).clone()).collect();
    let in_sequence: HashSet<&str> = sequence.iter().map(String::as_str).collect();

    let mut goals_completed = Vec::new();
    let mut goals_partial = Vec::new();
    for goal in goals {
        let present = goal
            .tasks
            .iter()
            .filter(|id| in_sequence.contains(id.as_str()))
            .count();
        if present == goal.tasks.len() {
            goals_completed.push(goal.id.clone());
        } else if present > 0 {
            goals_partial.push(goal.id.clone());
        }
    }

    let horizon = available_hours * PLANNING_HORIZON_WEEKS;
    let speed_score = if horizon == 0 {
        0.0
    } else {
        (100.0 - 100.0 * f64::from(makespan) / f64::from(horizon)).clamp(0.0, 100.0)
    };

    let coverage_score = if goals.is_empty() {
        0.0
    } else {
        100.0 * goals_completed.len() as f64 / goals.len() as f64
    };

    let urgency_score = urgency_score(tasks, order, now_unix_ms);

    PlanPath {
        sequence,
        total_hours: makespan,
        goals_completed,
        goals_partial,
        speed_score,
        coverage_score,
        urgency_score,
    }
}

/// Urgency of a sequence: averaged due-date buckets (default 25 when the
/// input lacks due dates), averaged priority points (default 15), plus a
/// size bonus of `min(20, 2 * |sequence|)`, clamped to [0, 100]. An empty
/// sequence scores the neutral 50.
fn urgency_score(tasks: &[Task], order: &[usize], now_unix_ms: i64) -> f64 {
    if order.is_empty() {
        return 50.0;
    }

    let mut due_points: Vec<f64> = Vec::new();
    let mut priority_points: Vec<f64> = Vec::new();

    for &handle in order {
        let task = &tasks[handle];
        if let Some(due) = task.due_date {
            due_points.push(due_urgency_points(due.timestamp_millis(), now_unix_ms));
        }
        priority_points.push(priority_urgency_points(task.priority));
    }

    let due_avg = if due_points.is_empty() {
        25.0
    } else {
        due_points.iter().sum::<f64>() / due_points.len() as f64
    };
    let priority_avg = if priority_points.is_empty() {
        15.0
    } else {
        priority_points.iter().sum::<f64>() / priority_points.len() as f64
    };
    let size_bonus = (2.0 * order.len() as f64).min(20.0);

    (due_avg + priority_avg + size_bonus).clamp(0.0, 100.0)
}

/// Drop every path dominated by another candidate. Paths are compared by
/// position, so equal-scored duplicates never dominate each other. An empty
/// frontier degrades to the first candidate.
pub(crate) fn pareto_filter(paths: Vec<PlanPath>) -> Vec<PlanPath> {
    if paths.is_empty() {
        return paths;
    }

    let frontier: Vec<PlanPath> = paths
        .iter()
        .enumerate()
        .filter(|&(i, candidate)| {
            !paths
                .iter()
                .enumerate()
                .any(|(j, other)| j != i && other.dominates(candidate))
        })
        .map(|(_, candidate)| candidate.clone())
        .collect();

    if frontier.is_empty() {
        vec![paths[0].clone()]
    } else {
        frontier
    }
}

/// Weighted-sum recommendation over the Pareto set; ties broken by shorter
/// total hours, then the lexically smallest first task id.
pub(crate) fn select_recommended(paths: &[PlanPath], weights: &ObjectiveWeights) -> Option<PlanPath> {
    paths
        .iter()
        .max_by(|a, b| {
            a.weighted_total(weights)
                .partial_cmp(&b.weighted_total(weights))
                .unwrap_or(std::cmp::Ordering::Equal)
                // Reversed: the max_by winner should have SMALLER hours/id
                .then_with(|| b.total_hours.cmp(&a.total_hours))
                .then_with(|| {
                    let first_a = a.sequence.first();
                    let first_b = b.sequence.first();
                    first_b.cmp(&first_a)
                })
        })
        .cloned()
}
