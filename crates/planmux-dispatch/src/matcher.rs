//! Task-to-solver matching
//!
//! Decision ladder (first rule to produce a solver wins):
//!
//! 1. An explicit `#solver` tag naming a known, available solver
//!    (confidence 1.0).
//! 2. A solver whose summary regex matches the task summary
//!    (confidence 0.9).
//! 3. Capability scoring over solvers whose complexity ceiling covers the
//!    task: `0.3 * capability_fit + 0.4 * history_score +
//!    0.3 * complexity_fit`, with the runner-up declared as fallback.
//! 4. The registry's most capable solver (confidence 0.3).
//!
//! Unknown tags surface as warnings; an unreachable rate-limit view
//! annotates the reason with "assuming available". Neither fails the match.

use crate::availability::AvailabilityProbe;
use crate::history::HistoryCalibrator;
use crate::registry::{SolverCapability, SolverRegistry};
use planmux_core::{Priority, SolverName, Task, TaskId};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Outcome of matching one task
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SolverMatch {
    pub solver: SolverName,
    /// 0-1, higher = stronger signal
    pub confidence: f64,
    pub reason: String,
    /// Next-best choice if the primary is rejected downstream
    pub fallback: Option<SolverName>,
    /// Non-fatal anomalies (unknown tags, degraded availability)
    pub warnings: Vec<String>,
}

/// Task complexity on a 1-10 scale, derived from the estimate, the touched
/// file count and the priority.
pub fn estimate_complexity(task: &Task) -> u8 {
    let mut complexity: i32 = match task.estimate_hours {
        0..=1 => 2,
        2..=4 => 4,
        5..=8 => 6,
        9..=16 => 8,
        _ => 10,
    };

    if task.affected_files.len() > 5 {
        complexity += 2;
    } else if task.affected_files.len() > 2 {
        complexity += 1;
    }

    complexity += match task.priority {
        Priority::ShowStopper => 2,
        Priority::Critical => 1,
        Priority::Minor => -1,
        _ => 0,
    };

    complexity.clamp(1, 10) as u8
}

/// Calibration ratio converted into a 0.3-1.0 matching score: finishing
/// faster than estimated approaches 1.0, running over degrades toward 0.3.
fn history_score(ratio: f64) -> f64 {
    if ratio <= 1.0 {
        (0.8 + 0.2 * (1.0 - ratio)).clamp(0.8, 1.0)
    } else {
        (0.8 - 0.3 * (ratio - 1.0)).max(0.3)
    }
}

/// 0.4 when any touched file's extension is in the solver's supported list
fn capability_fit(task: &Task, capability: &SolverCapability) -> f64 {
    let supported = |ext: &str| {
        capability
            .supported_extensions
            .iter()
            .any(|s| s.trim_start_matches('.').eq_ignore_ascii_case(ext))
    };
    let matches = task
        .affected_files
        .iter()
        .filter_map(|file| Path::new(file).extension().and_then(|e| e.to_str()))
        .any(supported);
    if matches {
        0.4
    } else {
        0.0
    }
}

/// Matches tasks against the solver fleet
pub struct SolverMatcher<'a> {
    registry: &'a SolverRegistry,
    availability: &'a AvailabilityProbe<'a>,
    history: &'a HistoryCalibrator,
}

impl<'a> SolverMatcher<'a> {
    pub fn new(
        registry: &'a SolverRegistry,
        availability: &'a AvailabilityProbe<'a>,
        history: &'a HistoryCalibrator,
    ) -> Self {
        Self {
            registry,
            availability,
            history,
        }
    }

    pub fn match_task(&self, task: &Task, tags: &[String], require_available: bool) -> SolverMatch {
        let mut warnings: Vec<String> = Vec::new();

        // Availability verdicts double as "assuming available" annotations
        let mut assumed = false;
        let mut passes = |name: &str| -> bool {
            if !require_available {
                return true;
            }
            let verdict = self.availability.check(name);
            if verdict.degraded {
                assumed = true;
            }
            verdict.available
        };

        // 1. Explicit tags override everything
        for tag in tags {
            let name = tag.trim_start_matches('#').to_lowercase();
            if self.registry.contains(&name) {
                if passes(&name) {
                    return annotate(
                        SolverMatch {
                            solver: name.clone(),
                            confidence: 1.0,
                            reason: format!("explicit tag #{name}"),
                            fallback: None,
                            warnings,
                        },
                        assumed,
                    );
                }
            } else {
                warnings.push(format!("unknown solver tag '#{name}'"));
            }
        }

        // 2. Summary pattern match
        for capability in self.registry.iter() {
            if let Some(regex) = &capability.summary_regex {
                if regex.is_match(&task.summary) && passes(&capability.name) {
                    return annotate(
                        SolverMatch {
                            solver: capability.name.clone(),
                            confidence: 0.9,
                            reason: format!("summary matches the {} pattern", capability.name),
                            fallback: None,
                            warnings,
                        },
                        assumed,
                    );
                }
            }
        }

        // 3. Capability scoring over complexity-capable solvers
        let complexity = estimate_complexity(task);
        let mut scored: Vec<(f64, &SolverCapability)> = self
            .registry
            .iter()
            .filter(|capability| capability.max_complexity >= complexity)
            .filter(|capability| passes(&capability.name))
            .map(|capability| {
                let ratio = self.history.ratio_for(Some(&capability.name));
                let complexity_fit =
                    1.0 - f64::from(capability.max_complexity.abs_diff(complexity)) / 10.0;
                let total = 0.3 * capability_fit(task, capability)
                    + 0.4 * history_score(ratio)
                    + 0.3 * complexity_fit;
                (total, capability)
            })
            .collect();
        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.name.cmp(&b.1.name))
        });

        if let Some((score, best)) = scored.first() {
            let fallback = scored.get(1).map(|(_, capability)| capability.name.clone());
            return annotate(
                SolverMatch {
                    solver: best.name.clone(),
                    confidence: *score,
                    reason: format!(
                        "complexity {complexity}/10 -> {} (max: {})",
                        best.name, best.max_complexity
                    ),
                    fallback,
                    warnings,
                },
                assumed,
            );
        }

        // 4. Nothing survived filtering: hand the task to the most capable
        match self.registry.most_capable() {
            Some(capability) => annotate(
                SolverMatch {
                    solver: capability.name.clone(),
                    confidence: 0.3,
                    reason: format!(
                        "fallback: no available solver covers complexity {complexity}/10"
                    ),
                    fallback: None,
                    warnings,
                },
                assumed,
            ),
            None => SolverMatch {
                solver: String::new(),
                confidence: 0.0,
                reason: "solver registry is empty".to_string(),
                fallback: None,
                warnings,
            },
        }
    }

    /// Match every task, keyed by task id
    pub fn match_all(
        &self,
        tasks: &[Task],
        tags_by_id: &HashMap<TaskId, Vec<String>>,
        require_available: bool,
    ) -> BTreeMap<TaskId, SolverMatch> {
        static NO_TAGS: Vec<String> = Vec::new();
        tasks
            .iter()
            .map(|task| {
                let tags = tags_by_id.get(&task.id).unwrap_or(&NO_TAGS);
                (
                    task.id.clone(),
                    self.match_task(task, tags, require_available),
                )
            })
            .collect()
    }
}

/// Tag a match whose availability verdict was assumed rather than observed
fn annotate(mut matched: SolverMatch, assumed: bool) -> SolverMatch {
    if assumed {
        matched.reason.push_str("; assuming available");
        matched
            .warnings
            .push("rate-limit view unreachable; assuming available".to_string());
    }
    matched
}

/// Markdown match report: per-task table plus a per-solver summary
pub fn format_matches(tasks: &[Task], matches: &BTreeMap<TaskId, SolverMatch>) -> String {
    let mut lines = vec![
        "## Solver Matching Results".to_string(),
        String::new(),
        "| Task | Complexity | Solver | Confidence | Reason |".to_string(),
        "|------|------------|--------|------------|--------|".to_string(),
    ];

    for task in tasks {
        if let Some(matched) = matches.get(&task.id) {
            let fallback = matched
                .fallback
                .as_ref()
                .map(|name| format!(" (fallback: {name})"))
                .unwrap_or_default();
            lines.push(format!(
                "| {} | {}/10 | **{}** | {:.0}% | {}{} |",
                task.id,
                estimate_complexity(task),
                matched.solver,
                matched.confidence * 100.0,
                matched.reason,
                fallback
            ));
        }
    }
    lines.push(String::new());

    let mut by_solver: BTreeMap<&str, usize> = BTreeMap::new();
    for matched in matches.values() {
        *by_solver.entry(matched.solver.as_str()).or_default() += 1;
    }
    let mut counts: Vec<(&str, usize)> = by_solver.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    lines.push("### Summary".to_string());
    for (solver, count) in counts {
        lines.push(format!("- **{solver}**: {count} tasks"));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn complexity_ladder_from_estimate() {
        let by_hours = |hours: u32| estimate_complexity(&Task::new("t", "x").estimate_hours(hours));
        assert_eq!(by_hours(1), 2);
        assert_eq!(by_hours(4), 4);
        assert_eq!(by_hours(8), 6);
        assert_eq!(by_hours(16), 8);
        assert_eq!(by_hours(17), 10);
    }

    #[test]
    fn complexity_boosts_for_files_and_priority() {
        let task = Task::new("t", "x")
            .estimate_hours(4)
            .files(["a", "b", "c"]);
        assert_eq!(estimate_complexity(&task), 5);

        let task = Task::new("t", "x")
            .estimate_hours(4)
            .files(["a", "b", "c", "d", "e", "f"]);
        assert_eq!(estimate_complexity(&task), 6);

        let task = Task::new("t", "x")
            .estimate_hours(4)
            .priority(Priority::ShowStopper);
        assert_eq!(estimate_complexity(&task), 6);

        let task = Task::new("t", "x")
            .estimate_hours(1)
            .priority(Priority::Minor);
        assert_eq!(estimate_complexity(&task), 1);

        let task = Task::new("t", "x")
            .estimate_hours(40)
            .files(["a", "b", "c", "d", "e", "f"])
            .priority(Priority::ShowStopper);
        assert_eq!(estimate_complexity(&task), 10);
    }

    #[test]
    fn history_score_conversion() {
        assert_eq!(history_score(1.0), 0.8);
        assert_eq!(history_score(0.5), 0.9);
        assert_eq!(history_score(0.0), 1.0);
        assert!((history_score(1.5) - 0.65).abs() < 1e-9);
        assert_eq!(history_score(4.0), 0.3);
    }

    #[test]
    fn capability_fit_checks_extensions() {
        let jules = SolverCapability::new("jules", 10).extensions([".py", ".rs"]);
        let hit = Task::new("t", "x").file("src/main.rs");
        let miss = Task::new("t", "x").file("notes.txt");
        let none = Task::new("t", "x");
        assert_eq!(capability_fit(&hit, &jules), 0.4);
        assert_eq!(capability_fit(&miss, &jules), 0.0);
        assert_eq!(capability_fit(&none, &jules), 0.0);
    }
}
