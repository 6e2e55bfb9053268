//! Universal planning invariants over a mixed dependency network

use chrono::{TimeZone, Utc};
use planmux_core::{Goal, PlanRequest, PlanResult, Priority, Task};
use planmux_solver::{Planner, SolveOptions};
use std::collections::{HashMap, HashSet};

/// A network with parallel chains, a diamond, due dates and file overlaps
fn mixed_request() -> PlanRequest {
    let due = |days: i64| {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap() + chrono::Duration::days(days)
    };
    PlanRequest::new(
        vec![
            Task::new("core", "Core layer")
                .goal("infra")
                .priority(Priority::ShowStopper)
                .estimate_hours(6)
                .file("core.rs"),
            Task::new("api", "API layer")
                .goal("infra")
                .priority(Priority::Major)
                .estimate_hours(4)
                .depends_on("core")
                .files(["api.rs", "core.rs"]),
            Task::new("ui", "UI layer")
                .goal("product")
                .estimate_hours(8)
                .depends_on("api")
                .file("ui.tsx")
                .due(due(2)),
            Task::new("cli", "CLI layer")
                .goal("product")
                .estimate_hours(3)
                .depends_on("api")
                .file("cli.rs")
                .due(due(20)),
            Task::new("docs", "Documentation")
                .goal("product")
                .priority(Priority::Minor)
                .estimate_hours(2)
                .file("README.md"),
            Task::new("bench", "Benchmarks")
                .goal("infra")
                .estimate_hours(5)
                .depends_on("core")
                .file("bench.rs"),
        ],
        vec![
            Goal::new("infra", "Infrastructure")
                .priority(3)
                .with_tasks(["core", "api", "bench"]),
            Goal::new("product", "Product")
                .priority(2)
                .with_tasks(["ui", "cli", "docs"]),
        ],
    )
    .max_parallel(4)
}

fn now_ms() -> i64 {
    Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0)
        .unwrap()
        .timestamp_millis()
}

fn planned() -> (PlanRequest, PlanResult) {
    let request = mixed_request();
    let result = Planner::new(request.clone())
        .plan(&SolveOptions::at(now_ms()))
        .unwrap();
    (request, result)
}

#[test]
fn every_path_covers_each_task_exactly_once() {
    let (request, result) = planned();
    let request_ids: HashSet<&str> = request.tasks.iter().map(|t| t.id.as_str()).collect();

    let mut paths: Vec<_> = result.pareto_paths.iter().collect();
    if let Some(recommended) = &result.recommended {
        paths.push(recommended);
    }
    for path in paths {
        let seen: HashSet<&str> = path.sequence.iter().map(String::as_str).collect();
        assert_eq!(seen.len(), path.sequence.len(), "duplicate id in path");
        assert_eq!(seen, request_ids, "path must cover the request exactly");
    }
}

#[test]
fn no_task_precedes_its_prerequisite() {
    let (request, result) = planned();
    let prereqs: HashMap<&str, &Vec<String>> = request
        .tasks
        .iter()
        .map(|t| (t.id.as_str(), &t.depends_on))
        .collect();

    for path in &result.pareto_paths {
        let position: HashMap<&str, usize> = path
            .sequence
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();
        for (task, deps) in &prereqs {
            for dep in deps.iter() {
                assert!(
                    position[dep.as_str()] < position[task],
                    "{dep} must precede {task}"
                );
            }
        }
    }
}

#[test]
fn batch_is_disjoint_capped_and_dependency_closed() {
    let (request, result) = planned();
    let by_id: HashMap<&str, &Task> = request.tasks.iter().map(|t| (t.id.as_str(), t)).collect();

    assert!(result.immediate_batch.len() <= request.max_parallel);

    let in_batch: HashSet<&str> = result.immediate_batch.iter().map(String::as_str).collect();
    let mut claimed: HashSet<&str> = HashSet::new();
    for id in &result.immediate_batch {
        let task = by_id[id.as_str()];
        for file in &task.affected_files {
            assert!(claimed.insert(file.as_str()), "file {file} claimed twice");
        }
        for dep in &task.depends_on {
            assert!(
                in_batch.contains(dep.as_str()) || request.completed.contains(dep),
                "prerequisite {dep} of {id} neither batched nor complete"
            );
        }
    }
}

#[test]
fn all_scores_are_within_bounds() {
    let (_, result) = planned();
    for path in &result.pareto_paths {
        for score in [path.speed_score, path.coverage_score, path.urgency_score] {
            assert!((0.0..=100.0).contains(&score), "score {score} out of range");
        }
    }

    let impacts = Planner::new(mixed_request()).value_impact().unwrap();
    for impact in &impacts {
        assert!(
            (0.0..=100.0).contains(&impact.value_score),
            "value {} out of range",
            impact.value_score
        );
    }
}

#[test]
fn value_scores_are_monotone_in_blocked_work() {
    let impacts = Planner::new(mixed_request()).value_impact().unwrap();
    let by_id: HashMap<&str, _> = impacts.iter().map(|i| (i.task_id.as_str(), i)).collect();

    for a in &impacts {
        for b in &impacts {
            let blocked_a: HashSet<&str> = a.blocked_tasks.iter().map(String::as_str).collect();
            let blocked_b: HashSet<&str> = b.blocked_tasks.iter().map(String::as_str).collect();
            let goals_a: HashSet<&str> = a.blocked_goals.iter().map(String::as_str).collect();
            let goals_b: HashSet<&str> = b.blocked_goals.iter().map(String::as_str).collect();
            if blocked_a.is_superset(&blocked_b)
                && a.blocked_hours >= b.blocked_hours
                && goals_a.is_superset(&goals_b)
            {
                assert!(
                    by_id[a.task_id.as_str()].value_score >= by_id[b.task_id.as_str()].value_score,
                    "{} should score at least {}",
                    a.task_id,
                    b.task_id
                );
            }
        }
    }
}

#[test]
fn pareto_set_contains_no_dominated_path() {
    let (_, result) = planned();
    for (i, a) in result.pareto_paths.iter().enumerate() {
        for (j, b) in result.pareto_paths.iter().enumerate() {
            if i != j {
                assert!(!a.dominates(b), "pareto output contains a dominated path");
            }
        }
    }
}

#[test]
fn removing_an_unrelated_task_only_shrinks_the_batch() {
    let (request, base) = planned();

    let mut smaller = request.clone();
    smaller.tasks.retain(|t| t.id != "docs");
    let result = Planner::new(smaller).plan(&SolveOptions::at(now_ms())).unwrap();

    let base_set: HashSet<&str> = base.immediate_batch.iter().map(String::as_str).collect();
    for id in &result.immediate_batch {
        assert!(base_set.contains(id.as_str()));
    }
}

#[test]
fn recommended_path_is_drawn_from_the_pareto_set() {
    let (_, result) = planned();
    let recommended = result.recommended.unwrap();
    assert!(result.pareto_paths.contains(&recommended));
}
