//! # planmux-solver
//!
//! Planning solver for planmux: dependency ordering, value-impact analysis,
//! multi-objective path scoring with Pareto filtering, and immediate-batch
//! selection.
//!
//! A planning call is a pure function from a request plus pre-fetched
//! snapshots to a result. It performs no I/O, mutates none of its inputs,
//! and is deterministic for a fixed request, snapshot and seed.
//!
//! ## Example
//!
//! ```rust
//! use planmux_core::{PlanRequest, Task, Goal};
//! use planmux_solver::{Planner, SolveOptions};
//!
//! let request = PlanRequest::new(
//!     vec![
//!         Task::new("T-1", "Set up schema").estimate_hours(2),
//!         Task::new("T-2", "Write queries").estimate_hours(3).depends_on("T-1"),
//!     ],
//!     vec![Goal::new("G-1", "Database").with_tasks(["T-1", "T-2"])],
//! );
//! let result = Planner::new(request).plan(&SolveOptions::at(0)).unwrap();
//! assert_eq!(result.recommended.unwrap().sequence, vec!["T-1", "T-2"]);
//! assert_eq!(result.immediate_batch, vec!["T-1", "T-2"]);
//! ```

use planmux_core::{
    Goal, PlanError, PlanPath, PlanRequest, PlanResult, Task, TaskId, ValueImpact,
};
use std::collections::{HashMap, HashSet};

pub mod conflict;
pub mod graph;
pub mod schedule;
pub mod value;

mod batch;
#[cfg(feature = "optimal-schedule")]
mod cp;
mod score;

pub use conflict::ConflictIndex;
pub use graph::DepGraph;
pub use schedule::{Candidate, ScheduleSolver, SolveOptions};

/// Multi-objective planner over one request
pub struct Planner {
    request: PlanRequest,
}

impl Planner {
    pub fn new(request: PlanRequest) -> Self {
        Self { request }
    }

    pub fn request(&self) -> &PlanRequest {
        &self.request
    }

    /// Produce the Pareto set, recommendation, immediate batch and
    /// explanation for this request.
    ///
    /// `InvalidRequest` and `CycleDetected` abort the call. An infeasible or
    /// cancelled solve degrades to the well-formed empty result instead.
    pub fn plan(&self, opts: &SolveOptions) -> Result<PlanResult, PlanError> {
        self.validate()?;

        let goals = self.effective_goals();
        let graph = DepGraph::build(&self.request.tasks);
        let topo = graph.topological_order()?;
        let conflicts = ConflictIndex::build(&self.request.tasks, &graph);

        if opts.cancel.is_cancelled() {
            return Ok(PlanResult::empty(empty_explanation(
                "planning was cancelled before the schedule solve",
            )));
        }

        let solver = ScheduleSolver::new(&self.request.tasks, &graph);
        let candidates = solver.solve(&topo, &goals, opts);
        if candidates.is_empty() {
            let cause = if opts.cancel.is_cancelled() {
                "planning was cancelled before the schedule solve"
            } else {
                "the schedule solver produced no candidate within budget"
            };
            return Ok(PlanResult::empty(empty_explanation(cause)));
        }

        let paths: Vec<PlanPath> = candidates
            .iter()
            .map(|candidate| {
                score::build_path(
                    &self.request.tasks,
                    &graph,
                    &candidate.order,
                    candidate.makespan,
                    &goals,
                    self.request.available_hours,
                    opts.now_unix_ms,
                )
            })
            .collect();

        let pareto_paths = score::pareto_filter(paths);
        let recommended = score::select_recommended(&pareto_paths, &self.request.weights);

        let batch_handles = batch::select_batch(
            &self.request.tasks,
            &graph,
            &topo,
            &self.request.completed,
            self.request.max_parallel,
        );
        debug_assert!(conflicts.conflict_free(&batch_handles));
        let immediate_batch: Vec<TaskId> = batch_handles
            .into_iter()
            .map(|h| graph.id(h).clone())
            .collect();

        let explanation =
            build_explanation(&self.request.tasks, &immediate_batch, recommended.as_ref());

        Ok(PlanResult {
            pareto_paths,
            recommended,
            immediate_batch,
            explanation,
        })
    }

    /// Value impacts for every task, ordered by score descending (ties by
    /// id ascending).
    pub fn value_impact(&self) -> Result<Vec<ValueImpact>, PlanError> {
        self.highest_value(usize::MAX)
    }

    /// The `limit` most valuable tasks by downstream impact
    pub fn highest_value(&self, limit: usize) -> Result<Vec<ValueImpact>, PlanError> {
        self.validate()?;
        let goals = self.effective_goals();
        let graph = DepGraph::build(&self.request.tasks);
        graph.topological_order()?;
        let impacts = value::analyze(&self.request.tasks, &goals, &graph);
        Ok(value::highest_value(impacts, limit))
    }

    fn validate(&self) -> Result<(), PlanError> {
        let mut seen_tasks: HashSet<&str> = HashSet::new();
        for task in &self.request.tasks {
            if !seen_tasks.insert(task.id.as_str()) {
                return Err(PlanError::InvalidRequest(format!(
                    "duplicate task id '{}'",
                    task.id
                )));
            }
        }

        let mut seen_goals: HashSet<&str> = HashSet::new();
        for goal in &self.request.goals {
            if !seen_goals.insert(goal.id.as_str()) {
                return Err(PlanError::InvalidRequest(format!(
                    "duplicate goal id '{}'",
                    goal.id
                )));
            }
        }

        if !self.request.goals.is_empty() {
            for task in &self.request.tasks {
                if let Some(goal_id) = &task.goal_id {
                    if !seen_goals.contains(goal_id.as_str()) {
                        return Err(PlanError::InvalidRequest(format!(
                            "task '{}' references unknown goal '{}'",
                            task.id, goal_id
                        )));
                    }
                }
            }
        }

        let weights = &self.request.weights;
        for (name, weight) in [
            ("speed", weights.speed),
            ("coverage", weights.coverage),
            ("urgency", weights.urgency),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(PlanError::InvalidRequest(format!(
                    "objective weight '{name}' must be a non-negative number, got {weight}"
                )));
            }
        }
        if weights.speed == 0.0 && weights.coverage == 0.0 && weights.urgency == 0.0 {
            return Err(PlanError::InvalidRequest(
                "contradictory objective weights: all zero".to_string(),
            ));
        }

        Ok(())
    }

    /// The request's goals, or a synthetic `default` goal spanning every
    /// task when the goal set is empty.
    fn effective_goals(&self) -> Vec<Goal> {
        if self.request.goals.is_empty() {
            vec![Goal::new("default", "Default").with_tasks(
                self.request.tasks.iter().map(|t| t.id.clone()),
            )]
        } else {
            self.request.goals.clone()
        }
    }
}

/// Plan a request in one call
pub fn plan(request: PlanRequest, opts: &SolveOptions) -> Result<PlanResult, PlanError> {
    Planner::new(request).plan(opts)
}

/// Rank a request's tasks by value impact in one call
pub fn value_impact(request: PlanRequest) -> Result<Vec<ValueImpact>, PlanError> {
    Planner::new(request).value_impact()
}

fn empty_explanation(cause: &str) -> String {
    format!("## Planning Decision\n\nNo feasible execution path: {cause}.")
}

fn build_explanation(tasks: &[Task], batch: &[TaskId], recommended: Option<&PlanPath>) -> String {
    let summaries: HashMap<&str, &str> = tasks
        .iter()
        .map(|t| (t.id.as_str(), t.summary.as_str()))
        .collect();
    let summary_of = |id: &str| summaries.get(id).copied().unwrap_or("");

    let mut lines: Vec<String> = Vec::new();
    lines.push("## Planning Decision".to_string());
    lines.push(String::new());

    lines.push(format!("### Immediate Batch ({} tasks)", batch.len()));
    for id in batch {
        lines.push(format!("- **{}**: {}", id, summary_of(id)));
    }
    lines.push(String::new());

    if let Some(path) = recommended {
        lines.push("### Recommended Path".to_string());
        lines.push(format!("- Total duration: {}h", path.total_hours));
        lines.push(format!("- Goals completed: {}", path.goals_completed.len()));
        lines.push(format!("- Speed score: {:.1}/100", path.speed_score));
        lines.push(format!("- Coverage score: {:.1}/100", path.coverage_score));
        lines.push(format!("- Urgency score: {:.1}/100", path.urgency_score));
        lines.push(String::new());
        lines.push("### Execution Order".to_string());
        for (position, id) in path.sequence.iter().take(10).enumerate() {
            lines.push(format!("{}. {}: {}", position + 1, id, summary_of(id)));
        }
        if path.sequence.len() > 10 {
            lines.push(format!("... and {} more", path.sequence.len() - 10));
        }
    }

    lines.join("\n")
}
