//! # planmux-core
//!
//! Core domain model and traits for the planmux planning engine.
//!
//! This crate provides:
//! - Domain types: `Task`, `Goal`, `PlanRequest`, `PlanPath`, `PlanResult`, `ValueImpact`
//! - Persistent-format types: `CompletionRecord`, `RateLimitRecord`
//! - Collaborator traits: `Clock`, `RateLimitView`
//! - Error types and the cancellation token
//!
//! ## Example
//!
//! ```rust
//! use planmux_core::{PlanRequest, Task, Goal, Priority};
//!
//! let request = PlanRequest::new(
//!     vec![
//!         Task::new("T-1", "Design the API").goal("G-1").estimate_hours(8),
//!         Task::new("T-2", "Implement the API")
//!             .goal("G-1")
//!             .depends_on("T-1")
//!             .priority(Priority::Major),
//!     ],
//!     vec![Goal::new("G-1", "API").with_tasks(["T-1", "T-2"])],
//! );
//! assert_eq!(request.available_hours, 40);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// Type Aliases
// ============================================================================

/// Unique identifier for a task
pub type TaskId = String;

/// Unique identifier for a goal
pub type GoalId = String;

/// Name of a registered solver
pub type SolverName = String;

// ============================================================================
// Priority
// ============================================================================

/// Task priority, ordered from least to most important.
///
/// String forms are case-insensitive and map deterministically onto the
/// numeric values `MINOR=1 .. SHOW_STOPPER=5`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Minor = 1,
    #[default]
    Normal = 2,
    Major = 3,
    Critical = 4,
    ShowStopper = 5,
}

impl Priority {
    /// Numeric weight, 1-5
    pub fn value(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::ShowStopper => "SHOW_STOPPER",
            Priority::Critical => "CRITICAL",
            Priority::Major => "MAJOR",
            Priority::Normal => "NORMAL",
            Priority::Minor => "MINOR",
        }
    }
}

impl FromStr for Priority {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SHOW_STOPPER" | "SHOW-STOPPER" | "SHOWSTOPPER" => Ok(Priority::ShowStopper),
            "CRITICAL" => Ok(Priority::Critical),
            "MAJOR" => Ok(Priority::Major),
            "NORMAL" => Ok(Priority::Normal),
            "MINOR" => Ok(Priority::Minor),
            other => Err(PlanError::InvalidRequest(format!(
                "unknown priority '{other}'"
            ))),
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Priority {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Task
// ============================================================================

fn default_estimate_hours() -> u32 {
    4
}

/// One unit of work with estimate, priority, prerequisites and touched files.
///
/// The reverse dependency list (`blocks`) is derived by the dependency graph
/// at planning time and is not stored on the task itself.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier (opaque string)
    pub id: TaskId,
    /// Human-readable summary
    pub summary: String,
    /// Owning goal, if any
    #[serde(default)]
    pub goal_id: Option<GoalId>,
    /// Priority (default NORMAL)
    #[serde(default)]
    pub priority: Priority,
    /// Estimated effort in hours (default 4)
    #[serde(default = "default_estimate_hours")]
    pub estimate_hours: u32,
    /// Prerequisite task ids
    #[serde(default)]
    pub depends_on: Vec<TaskId>,
    /// File paths this task touches (case-sensitive)
    #[serde(default)]
    pub affected_files: Vec<String>,
    /// Preferred solver, if the source record carried one
    #[serde(default)]
    pub solver_hint: Option<SolverName>,
    /// Absolute due instant
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a new task with the given id and summary
    pub fn new(id: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            summary: summary.into(),
            goal_id: None,
            priority: Priority::Normal,
            estimate_hours: default_estimate_hours(),
            depends_on: Vec::new(),
            affected_files: Vec::new(),
            solver_hint: None,
            due_date: None,
        }
    }

    /// Set the owning goal
    pub fn goal(mut self, goal_id: impl Into<String>) -> Self {
        self.goal_id = Some(goal_id.into());
        self
    }

    /// Set the priority
    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the estimate in hours
    pub fn estimate_hours(mut self, hours: u32) -> Self {
        self.estimate_hours = hours;
        self
    }

    /// Add a prerequisite task
    pub fn depends_on(mut self, prerequisite: impl Into<String>) -> Self {
        self.depends_on.push(prerequisite.into());
        self
    }

    /// Add a touched file path
    pub fn file(mut self, path: impl Into<String>) -> Self {
        self.affected_files.push(path.into());
        self
    }

    /// Add several touched file paths
    pub fn files<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.affected_files.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Set the solver hint
    pub fn solver_hint(mut self, solver: impl Into<String>) -> Self {
        self.solver_hint = Some(solver.into());
        self
    }

    /// Set the due date
    pub fn due(mut self, due: DateTime<Utc>) -> Self {
        self.due_date = Some(due);
        self
    }
}

// ============================================================================
// Goal
// ============================================================================

fn default_goal_priority() -> i32 {
    1
}

/// A grouping of tasks with its own priority (higher = more important)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub id: GoalId,
    pub name: String,
    #[serde(default = "default_goal_priority")]
    pub priority: i32,
    #[serde(default)]
    pub tasks: Vec<TaskId>,
}

impl Goal {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            priority: default_goal_priority(),
            tasks: Vec::new(),
        }
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_tasks<I, S>(mut self, tasks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tasks.extend(tasks.into_iter().map(Into::into));
        self
    }
}

// ============================================================================
// PlanRequest
// ============================================================================

/// Relative importance of the three objectives. All weights non-negative.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectiveWeights {
    pub speed: f64,
    pub coverage: f64,
    pub urgency: f64,
}

impl Default for ObjectiveWeights {
    fn default() -> Self {
        Self {
            speed: 1.0,
            coverage: 1.0,
            urgency: 1.0,
        }
    }
}

fn default_available_hours() -> u32 {
    40
}

fn default_max_parallel() -> usize {
    15
}

/// Input to a planning call
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanRequest {
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub goals: Vec<Goal>,
    /// Weekly capacity in hours
    #[serde(default = "default_available_hours")]
    pub available_hours: u32,
    /// Dispatch slots for the immediate batch
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,
    #[serde(default, rename = "objective_weights")]
    pub weights: ObjectiveWeights,
    /// Task ids already completed outside this request; prerequisites in
    /// this set count as satisfied for batch selection.
    #[serde(default)]
    pub completed: BTreeSet<TaskId>,
}

impl PlanRequest {
    pub fn new(tasks: Vec<Task>, goals: Vec<Goal>) -> Self {
        Self {
            tasks,
            goals,
            available_hours: default_available_hours(),
            max_parallel: default_max_parallel(),
            weights: ObjectiveWeights::default(),
            completed: BTreeSet::new(),
        }
    }

    pub fn available_hours(mut self, hours: u32) -> Self {
        self.available_hours = hours;
        self
    }

    pub fn max_parallel(mut self, slots: usize) -> Self {
        self.max_parallel = slots;
        self
    }

    pub fn weights(mut self, weights: ObjectiveWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn completed<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.completed.extend(ids.into_iter().map(Into::into));
        self
    }
}

// ============================================================================
// PlanPath / PlanResult
// ============================================================================

/// A full dependency-respecting ordering of the request's tasks with
/// aggregate metrics. All three scores are 0-100, higher = better.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanPath {
    /// Ordered task ids
    pub sequence: Vec<TaskId>,
    /// Makespan of the underlying schedule in hours
    pub total_hours: u32,
    pub goals_completed: Vec<GoalId>,
    /// Goals with some but not all tasks in the sequence
    pub goals_partial: Vec<GoalId>,
    pub speed_score: f64,
    pub coverage_score: f64,
    pub urgency_score: f64,
}

impl PlanPath {
    /// True if `self` is at least as good as `other` on every score and
    /// strictly better on at least one.
    pub fn dominates(&self, other: &PlanPath) -> bool {
        let pairs = [
            (self.speed_score, other.speed_score),
            (self.coverage_score, other.coverage_score),
            (self.urgency_score, other.urgency_score),
        ];
        let mut strictly_better = false;
        for (ours, theirs) in pairs {
            if ours < theirs {
                return false;
            }
            if ours > theirs {
                strictly_better = true;
            }
        }
        strictly_better
    }

    /// Weighted-sum objective used for recommendation selection
    pub fn weighted_total(&self, weights: &ObjectiveWeights) -> f64 {
        self.speed_score * weights.speed
            + self.coverage_score * weights.coverage
            + self.urgency_score * weights.urgency
    }
}

/// Output of a planning call
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    /// Non-dominated candidate paths
    pub pareto_paths: Vec<PlanPath>,
    /// Best path by weighted sum; absent when no feasible path exists
    pub recommended: Option<PlanPath>,
    /// Conflict-free, dependency-closed tasks to dispatch now
    pub immediate_batch: Vec<TaskId>,
    /// Human-readable reasoning
    pub explanation: String,
}

impl PlanResult {
    /// The well-formed empty result used when the solver yields no candidate
    pub fn empty(explanation: impl Into<String>) -> Self {
        Self {
            pareto_paths: Vec::new(),
            recommended: None,
            immediate_batch: Vec::new(),
            explanation: explanation.into(),
        }
    }
}

// ============================================================================
// ValueImpact
// ============================================================================

/// The downstream work a task unlocks: transitively-blocked tasks, hours
/// and goals, plus a composite 0-100 score.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValueImpact {
    pub task_id: TaskId,
    pub summary: String,
    pub priority: Priority,
    /// Tasks directly blocked by this one
    pub direct_blockers: usize,
    /// All tasks transitively blocked, sorted by id
    pub blocked_tasks: Vec<TaskId>,
    /// Sum of estimates over the transitive set
    pub blocked_hours: u32,
    /// Goals whose task set intersects the transitive set, sorted by id
    pub blocked_goals: Vec<GoalId>,
    /// Composite score, one decimal, clamped to [0, 100]
    pub value_score: f64,
}

// ============================================================================
// Persistent formats (consumed, never written)
// ============================================================================

fn default_true() -> bool {
    true
}

/// One row of the append-only completion log (JSON lines).
/// Unknown fields are ignored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub task_id: TaskId,
    pub estimated_hours: f64,
    pub actual_hours: f64,
    pub solver: SolverName,
    /// ISO 8601 timestamp; opaque to the core
    pub completed_at: String,
    #[serde(default = "default_true")]
    pub success: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Current rate-limit state for one (model, account) pair.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitRecord {
    pub model: String,
    pub account: String,
    pub is_limited: bool,
    /// Milliseconds since the Unix epoch at which the limit lifts
    pub available_at_unix: i64,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub detected_at: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

/// Normalize a model name for key construction: lowercase, spaces become
/// hyphens, then only alphanumerics and `-` survive.
pub fn normalize_model(model: &str) -> String {
    model
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' { '-' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect()
}

/// Normalize an account for key construction: lowercase, keeping
/// alphanumerics and `@.-`.
pub fn normalize_account(account: &str) -> String {
    account
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '@' | '.' | '-'))
        .collect()
}

/// Key under which the current rate-limit record for a (model, account)
/// pair is stored.
pub fn rate_limit_key(model: &str, account: &str) -> String {
    format!(
        "ratelimit:current:{}:{}",
        normalize_model(model),
        normalize_account(account)
    )
}

// ============================================================================
// Collaborator traits
// ============================================================================

/// Time source; used only for availability and urgency calculations
pub trait Clock {
    fn now_unix_ms(&self) -> i64;
}

/// Wall-clock backed by the system time
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix_ms(&self) -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }
}

/// A fixed clock for tests and replays
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_unix_ms(&self) -> i64 {
        self.0
    }
}

/// The rate-limit view is unreachable; distinguishable from an absent record
#[derive(Clone, Debug, Error, PartialEq)]
#[error("rate-limit view unreachable: {0}")]
pub struct RateLimitUnreachable(pub String);

/// Read-only view of the external rate-limit store.
///
/// `Ok(None)` means no current record exists for the pair; `Err` means the
/// store itself could not be consulted.
pub trait RateLimitView {
    fn get(
        &self,
        model: &str,
        account: &str,
    ) -> Result<Option<RateLimitRecord>, RateLimitUnreachable>;
}

// ============================================================================
// Cancellation
// ============================================================================

/// Cooperative cancellation flag checked by the schedule solver before and
/// between candidate resolves.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Errors that abort a planning call
#[derive(Clone, Debug, Error, PartialEq)]
pub enum PlanError {
    /// Missing ids, contradictory weights, malformed fields
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The dependency graph has a cycle; carries one witnessing cycle
    #[error("dependency cycle detected: {}", cycle.join(" -> "))]
    CycleDetected { cycle: Vec<TaskId> },
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn priority_numeric_values() {
        assert_eq!(Priority::ShowStopper.value(), 5);
        assert_eq!(Priority::Critical.value(), 4);
        assert_eq!(Priority::Major.value(), 3);
        assert_eq!(Priority::Normal.value(), 2);
        assert_eq!(Priority::Minor.value(), 1);
    }

    #[test]
    fn priority_ordering_matches_values() {
        assert!(Priority::ShowStopper > Priority::Critical);
        assert!(Priority::Critical > Priority::Major);
        assert!(Priority::Minor < Priority::Normal);
    }

    #[test]
    fn priority_parse_case_insensitive() {
        assert_eq!("show_stopper".parse::<Priority>().unwrap(), Priority::ShowStopper);
        assert_eq!("Critical".parse::<Priority>().unwrap(), Priority::Critical);
        assert_eq!("MINOR".parse::<Priority>().unwrap(), Priority::Minor);
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn task_builder() {
        let task = Task::new("T-1", "Implement login")
            .goal("G-1")
            .priority(Priority::Critical)
            .estimate_hours(8)
            .depends_on("T-0")
            .files(["auth.rs", "routes.rs"])
            .solver_hint("jules");

        assert_eq!(task.id, "T-1");
        assert_eq!(task.goal_id.as_deref(), Some("G-1"));
        assert_eq!(task.priority, Priority::Critical);
        assert_eq!(task.estimate_hours, 8);
        assert_eq!(task.depends_on, vec!["T-0"]);
        assert_eq!(task.affected_files.len(), 2);
        assert_eq!(task.solver_hint.as_deref(), Some("jules"));
    }

    #[test]
    fn task_deserialize_defaults() {
        let task: Task =
            serde_json::from_str(r#"{"id": "T-1", "summary": "Minimal"}"#).unwrap();
        assert_eq!(task.priority, Priority::Normal);
        assert_eq!(task.estimate_hours, 4);
        assert!(task.depends_on.is_empty());
        assert!(task.due_date.is_none());
    }

    #[test]
    fn task_deserialize_ignores_unknown_fields() {
        // Source records carry a derived `blocks` list; it is recomputed here
        let task: Task = serde_json::from_str(
            r#"{"id": "T-1", "summary": "x", "blocks": ["T-2"], "extra": 1}"#,
        )
        .unwrap();
        assert_eq!(task.id, "T-1");
    }

    #[test]
    fn request_deserialize_source_shape() {
        let request: PlanRequest = serde_json::from_str(
            r#"{
                "tasks": [
                    {"id": "T-1", "summary": "Task 1", "goal_id": "G-1", "priority": "CRITICAL"}
                ],
                "goals": [{"id": "G-1", "name": "Goal 1"}],
                "objective_weights": {"speed": 2.0}
            }"#,
        )
        .unwrap();
        assert_eq!(request.available_hours, 40);
        assert_eq!(request.max_parallel, 15);
        assert_eq!(request.tasks[0].priority, Priority::Critical);
        assert_eq!(request.weights.speed, 2.0);
        assert_eq!(request.weights.coverage, 1.0);
    }

    #[test]
    fn dominates_strictly_better_in_one() {
        let better = PlanPath {
            sequence: vec![],
            total_hours: 4,
            goals_completed: vec![],
            goals_partial: vec![],
            speed_score: 90.0,
            coverage_score: 80.0,
            urgency_score: 70.0,
        };
        let worse = PlanPath {
            speed_score: 80.0,
            ..better.clone()
        };
        assert!(better.dominates(&worse));
        assert!(!worse.dominates(&better));
    }

    #[test]
    fn dominates_false_when_worse_in_any() {
        let a = PlanPath {
            sequence: vec![],
            total_hours: 4,
            goals_completed: vec![],
            goals_partial: vec![],
            speed_score: 90.0,
            coverage_score: 70.0,
            urgency_score: 70.0,
        };
        let b = PlanPath {
            speed_score: 80.0,
            coverage_score: 80.0,
            ..a.clone()
        };
        assert!(!a.dominates(&b));
        assert!(!b.dominates(&a));
    }

    #[test]
    fn dominates_false_on_equal_paths() {
        let a = PlanPath {
            sequence: vec![],
            total_hours: 4,
            goals_completed: vec![],
            goals_partial: vec![],
            speed_score: 50.0,
            coverage_score: 50.0,
            urgency_score: 50.0,
        };
        assert!(!a.dominates(&a.clone()));
    }

    #[test]
    fn completion_record_defaults_and_unknown_fields() {
        let record: CompletionRecord = serde_json::from_str(
            r#"{
                "task_id": "SAM-1",
                "estimated_hours": 4,
                "actual_hours": 6,
                "solver": "jules",
                "completed_at": "2026-01-15T10:30:00",
                "session": "ignored"
            }"#,
        )
        .unwrap();
        assert!(record.success);
        assert!(record.notes.is_none());
        assert_eq!(record.actual_hours, 6.0);
    }

    #[test]
    fn rate_limit_record_camel_case_keys() {
        let record: RateLimitRecord = serde_json::from_str(
            r#"{
                "model": "gemini-1.5-pro",
                "account": "default",
                "isLimited": true,
                "availableAtUnix": 1750000000000,
                "sessionId": "abc",
                "detectedAt": "2026-01-15T10:30:00Z",
                "source": "probe"
            }"#,
        )
        .unwrap();
        assert!(record.is_limited);
        assert_eq!(record.available_at_unix, 1_750_000_000_000);
    }

    #[test]
    fn rate_limit_key_normalization() {
        assert_eq!(
            rate_limit_key("Gemini 1.5 Pro", "User@Example.COM"),
            "ratelimit:current:gemini-15-pro:user@example.com"
        );
    }

    #[test]
    fn cancel_token_flips_once() {
        let token = CancelToken::new();
        let observer = token.clone();
        assert!(!observer.is_cancelled());
        token.cancel();
        assert!(observer.is_cancelled());
    }

    #[test]
    fn plan_error_display() {
        let err = PlanError::CycleDetected {
            cycle: vec!["T-1".into(), "T-2".into()],
        };
        assert_eq!(format!("{err}"), "dependency cycle detected: T-1 -> T-2");
    }
}
