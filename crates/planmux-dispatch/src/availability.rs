//! Solver availability probing
//!
//! Availability is decided from an externally-fetched rate-limit snapshot:
//!
//! 1. A statically unavailable solver is unavailable, full stop.
//! 2. A solver with no rate-limited models is always available.
//! 3. Otherwise the solver is available iff any of its models has no
//!    current record, is not limited, or its limit has already lifted. When
//!    every model is limited, the earliest lift time is reported.
//! 4. An unreachable rate-limit view degrades to "assuming available".

use crate::registry::SolverRegistry;
use planmux_core::{rate_limit_key, Clock, RateLimitRecord, RateLimitUnreachable, RateLimitView, SolverName};
use serde::Serialize;
use std::collections::HashMap;

/// Availability verdict for one solver
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SolverAvailability {
    pub solver: SolverName,
    pub available: bool,
    /// Earliest instant any model frees up, when every model is limited
    pub available_at_unix_ms: Option<i64>,
    pub reason: String,
    /// True when the verdict was assumed because the view was unreachable
    pub degraded: bool,
}

impl SolverAvailability {
    fn up(solver: &str, reason: impl Into<String>) -> Self {
        Self {
            solver: solver.to_string(),
            available: true,
            available_at_unix_ms: None,
            reason: reason.into(),
            degraded: false,
        }
    }

    fn down(solver: &str, reason: impl Into<String>) -> Self {
        Self {
            solver: solver.to_string(),
            available: false,
            available_at_unix_ms: None,
            reason: reason.into(),
            degraded: false,
        }
    }
}

/// Probes solver availability against a rate-limit snapshot
pub struct AvailabilityProbe<'a> {
    registry: &'a SolverRegistry,
    view: &'a dyn RateLimitView,
    clock: &'a dyn Clock,
    account: String,
}

impl<'a> AvailabilityProbe<'a> {
    pub fn new(
        registry: &'a SolverRegistry,
        view: &'a dyn RateLimitView,
        clock: &'a dyn Clock,
        account: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            view,
            clock,
            account: account.into(),
        }
    }

    pub fn check(&self, solver: &str) -> SolverAvailability {
        let capability = match self.registry.get(solver) {
            Some(capability) => capability,
            None => return SolverAvailability::down(solver, "not in registry"),
        };

        if let Some(reason) = &capability.unavailable_reason {
            return SolverAvailability::down(solver, reason.clone());
        }

        if capability.rate_limited_models.is_empty() {
            return SolverAvailability::up(solver, "no rate-limited models");
        }

        let now = self.clock.now_unix_ms();
        let mut earliest: Option<i64> = None;

        for model in &capability.rate_limited_models {
            match self.view.get(model, &self.account) {
                Err(RateLimitUnreachable(cause)) => {
                    return SolverAvailability {
                        solver: solver.to_string(),
                        available: true,
                        available_at_unix_ms: None,
                        reason: format!(
                            "rate-limit view unreachable ({cause}); assuming available"
                        ),
                        degraded: true,
                    };
                }
                Ok(None) => {
                    return SolverAvailability::up(
                        solver,
                        format!("no current rate limit for {model}"),
                    );
                }
                Ok(Some(record)) if !record.is_limited => {
                    return SolverAvailability::up(solver, format!("{model} is not limited"));
                }
                Ok(Some(record)) if record.available_at_unix <= now => {
                    return SolverAvailability::up(
                        solver,
                        format!("rate limit on {model} has expired"),
                    );
                }
                Ok(Some(record)) => {
                    earliest = Some(match earliest {
                        Some(at) => at.min(record.available_at_unix),
                        None => record.available_at_unix,
                    });
                }
            }
        }

        SolverAvailability {
            solver: solver.to_string(),
            available: false,
            available_at_unix_ms: earliest,
            reason: match earliest {
                Some(at) => format!("all models rate limited until {at}"),
                None => "all models rate limited".to_string(),
            },
            degraded: false,
        }
    }

    /// Availability for every registered solver, in name order
    pub fn check_all(&self) -> Vec<SolverAvailability> {
        self.registry
            .iter()
            .map(|capability| self.check(&capability.name))
            .collect()
    }
}

/// Rate-limit snapshot materialized into memory, keyed by the normalized
/// `ratelimit:current:<model>:<account>` form.
#[derive(Debug, Default)]
pub struct InMemoryRateLimitView {
    records: HashMap<String, RateLimitRecord>,
}

impl InMemoryRateLimitView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = RateLimitRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|record| (rate_limit_key(&record.model, &record.account), record))
            .collect();
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RateLimitView for InMemoryRateLimitView {
    fn get(
        &self,
        model: &str,
        account: &str,
    ) -> Result<Option<RateLimitRecord>, RateLimitUnreachable> {
        Ok(self.records.get(&rate_limit_key(model, account)).cloned())
    }
}

/// Markdown availability table
pub fn format_availability(availabilities: &[SolverAvailability]) -> String {
    let mut lines = vec![
        "## Solver Availability".to_string(),
        String::new(),
        "| Solver | Status | Reason |".to_string(),
        "|--------|--------|--------|".to_string(),
    ];
    for availability in availabilities {
        let status = if availability.available {
            "available"
        } else {
            "unavailable"
        };
        lines.push(format!(
            "| {} | {} | {} |",
            availability.solver, status, availability.reason
        ));
    }
    lines.join("\n")
}
