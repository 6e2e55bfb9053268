//! # planmux-dispatch
//!
//! Solver-side half of the planmux engine: the registry of external worker
//! identities, live availability probing against a rate-limit snapshot,
//! estimate calibration from the completion history, and the matcher that
//! assigns each task a solver.
//!
//! All collaborator state (registry, rate-limit view, history snapshot,
//! clock) is passed in explicitly; nothing here talks to the network.
//!
//! ## Example
//!
//! ```rust
//! use planmux_core::{FixedClock, Task};
//! use planmux_dispatch::{
//!     AvailabilityProbe, HistoryCalibrator, InMemoryRateLimitView, SolverMatcher,
//!     SolverRegistry,
//! };
//!
//! let registry = SolverRegistry::builtin();
//! let view = InMemoryRateLimitView::new();
//! let clock = FixedClock(0);
//! let probe = AvailabilityProbe::new(&registry, &view, &clock, "default");
//! let history = HistoryCalibrator::default();
//! let matcher = SolverMatcher::new(&registry, &probe, &history);
//!
//! let task = Task::new("T-1", "Fix the login bug").estimate_hours(2);
//! let matched = matcher.match_task(&task, &[], true);
//! assert_eq!(matched.solver, "jules");
//! ```

pub mod availability;
pub mod history;
pub mod matcher;
pub mod registry;

pub use availability::{
    format_availability, AvailabilityProbe, InMemoryRateLimitView, SolverAvailability,
};
pub use history::{
    format_calibration, read_completion_log, CalibrationStats, HistoryCalibrator, HistoryError,
};
pub use matcher::{estimate_complexity, format_matches, SolverMatch, SolverMatcher};
pub use registry::{SolverCapability, SolverRegistry};

use planmux_core::CompletionRecord;

/// Calibrate an estimate against a completion-history snapshot in one call
pub fn calibrate_estimate(
    records: &[CompletionRecord],
    original_hours: f64,
    solver: Option<&str>,
) -> f64 {
    HistoryCalibrator::from_records(records).calibrate(original_hours, solver)
}
