//! Constraint-programming schedule solving
//!
//! Formulates the start-time model of `schedule.rs` for the Pumpkin solver:
//!
//! - **Variables**: integer start per task, domain `[0, horizon]`
//! - **Constraints**: `start(T) - start(U) >= duration(U)` per dependency
//! - **Objective**: minimize makespan (latest finish)
//!
//! The search runs under the caller's wall-clock budget; a solution proven
//! optimal and a merely-feasible solution found at budget expiry are both
//! accepted. `None` means the search produced nothing in time and the
//! caller should fall back to the forward pass.
//!
//! # Feature Flag
//!
//! This module requires the `optimal-schedule` feature:
//!
//! ```toml
//! planmux-solver = { version = "0.3", features = ["optimal-schedule"] }
//! ```

use crate::graph::DepGraph;
use crate::schedule::SolveOptions;
use planmux_core::Task;
use pumpkin_solver::constraints as cp;
use pumpkin_solver::optimisation::linear_sat_unsat::LinearSatUnsat;
use pumpkin_solver::optimisation::OptimisationDirection;
use pumpkin_solver::results::{OptimisationResult, ProblemSolution};
use pumpkin_solver::termination::TimeBudget;
use pumpkin_solver::variables::TransformableVariable;
use pumpkin_solver::Solver;

pub(crate) fn minimize_makespan(
    tasks: &[Task],
    graph: &DepGraph,
    opts: &SolveOptions,
) -> Option<Vec<u32>> {
    if tasks.is_empty() {
        return Some(Vec::new());
    }

    // Twice the serial length always admits a feasible assignment
    let total: i64 = tasks.iter().map(|t| i64::from(t.estimate_hours)).sum();
    let horizon = total.saturating_mul(2).min(i64::from(i32::MAX)) as i32;

    let mut solver = Solver::default();

    let start_vars: Vec<_> = tasks
        .iter()
        .map(|task| {
            let duration = task.estimate_hours as i32;
            solver.new_bounded_integer(0, (horizon - duration).max(0))
        })
        .collect();

    let constraint_tag = solver.new_constraint_tag();

    // start[task] >= start[dep] + duration[dep]
    for (handle, _) in tasks.iter().enumerate() {
        for &dep in graph.deps_of(handle) {
            let dep_duration = tasks[dep].estimate_hours as i32;
            let vars = vec![start_vars[handle].scaled(1), start_vars[dep].scaled(-1)];
            let _ = solver
                .add_constraint(cp::greater_than_or_equals(
                    vars,
                    dep_duration,
                    constraint_tag,
                ))
                .post();
        }
    }

    // makespan >= start[i] + duration[i] for all tasks
    let makespan = solver.new_bounded_integer(0, horizon);
    for (handle, task) in tasks.iter().enumerate() {
        let vars = vec![makespan.scaled(1), start_vars[handle].scaled(-1)];
        let _ = solver
            .add_constraint(cp::greater_than_or_equals(
                vars,
                task.estimate_hours as i32,
                constraint_tag,
            ))
            .post();
    }

    let mut brancher = solver.default_brancher();
    let mut termination = TimeBudget::starting_now(opts.deadline);

    fn noop_callback<B>(_: &Solver, _: pumpkin_solver::results::SolutionReference, _: &B) {}
    let result = solver.optimise(
        &mut brancher,
        &mut termination,
        LinearSatUnsat::new(OptimisationDirection::Minimise, makespan, noop_callback),
    );

    match result {
        OptimisationResult::Optimal(solution) => Some(
            start_vars
                .iter()
                .map(|&var| solution.get_integer_value(var).max(0) as u32)
                .collect(),
        ),
        // Budget expired while improving: keep the best feasible solution
        OptimisationResult::Satisfiable(solution) => Some(
            start_vars
                .iter()
                .map(|&var| solution.get_integer_value(var).max(0) as u32)
                .collect(),
        ),
        OptimisationResult::Unsatisfiable | OptimisationResult::Unknown => None,
    }
}
