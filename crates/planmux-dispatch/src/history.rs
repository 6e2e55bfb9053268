//! Estimate calibration from the completion history
//!
//! The completion log is append-only JSON lines, written by an external
//! collaborator and read here as a snapshot. Every record with a positive
//! estimate contributes `actual / estimated` to the ratio statistics; with
//! fewer than three records calibration is the identity. Ratios are clamped
//! to [0.1, 10] before use.

use planmux_core::CompletionRecord;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::BufRead;
use thiserror::Error;

const MIN_SAMPLE_SIZE: usize = 3;
const RATIO_CLAMP: (f64, f64) = (0.1, 10.0);

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("failed to read completion log: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed completion record on line {line}: {source}")]
    Parse {
        line: usize,
        source: serde_json::Error,
    },
}

/// Parse a JSON-lines completion log. Blank lines are skipped; a malformed
/// line is an error rather than silent data loss.
pub fn read_completion_log<R: BufRead>(reader: R) -> Result<Vec<CompletionRecord>, HistoryError> {
    let mut records = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let record: CompletionRecord =
            serde_json::from_str(trimmed).map_err(|source| HistoryError::Parse {
                line: index + 1,
                source,
            })?;
        records.push(record);
    }
    Ok(records)
}

/// Aggregated estimate-vs-actual statistics
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CalibrationStats {
    pub sample_size: usize,
    /// Mean of actual/estimated over records with a positive estimate
    pub mean_ratio: f64,
    /// Sample standard deviation of the ratios
    pub std_dev: f64,
    /// Per-solver mean ratios
    pub by_solver: BTreeMap<String, f64>,
}

impl Default for CalibrationStats {
    fn default() -> Self {
        Self {
            sample_size: 0,
            mean_ratio: 1.0,
            std_dev: 0.0,
            by_solver: BTreeMap::new(),
        }
    }
}

/// Estimate calibrator backed by completion statistics
#[derive(Clone, Debug, Default)]
pub struct HistoryCalibrator {
    stats: CalibrationStats,
}

impl HistoryCalibrator {
    pub fn from_records(records: &[CompletionRecord]) -> Self {
        let mut ratios: Vec<f64> = Vec::new();
        let mut by_solver: BTreeMap<String, Vec<f64>> = BTreeMap::new();

        for record in records {
            if record.estimated_hours > 0.0 {
                let ratio = record.actual_hours / record.estimated_hours;
                ratios.push(ratio);
                by_solver.entry(record.solver.clone()).or_default().push(ratio);
            }
        }

        let mean_ratio = if ratios.is_empty() {
            1.0
        } else {
            ratios.iter().sum::<f64>() / ratios.len() as f64
        };

        let std_dev = if ratios.len() > 1 {
            let variance = ratios
                .iter()
                .map(|r| (r - mean_ratio).powi(2))
                .sum::<f64>()
                / (ratios.len() - 1) as f64;
            variance.sqrt()
        } else {
            0.0
        };

        let by_solver = by_solver
            .into_iter()
            .map(|(solver, rs)| {
                let mean = rs.iter().sum::<f64>() / rs.len() as f64;
                (solver, mean)
            })
            .collect();

        Self {
            stats: CalibrationStats {
                sample_size: records.len(),
                mean_ratio,
                std_dev,
                by_solver,
            },
        }
    }

    pub fn stats(&self) -> &CalibrationStats {
        &self.stats
    }

    /// The ratio applied for a solver: the solver's own mean when known,
    /// the overall mean otherwise, identity below the minimum sample size.
    /// Always clamped to [0.1, 10].
    pub fn ratio_for(&self, solver: Option<&str>) -> f64 {
        if self.stats.sample_size < MIN_SAMPLE_SIZE {
            return 1.0;
        }
        let ratio = solver
            .and_then(|name| self.stats.by_solver.get(name).copied())
            .unwrap_or(self.stats.mean_ratio);
        ratio.clamp(RATIO_CLAMP.0, RATIO_CLAMP.1)
    }

    /// Adjust an estimate by the learned ratio
    pub fn calibrate(&self, original_hours: f64, solver: Option<&str>) -> f64 {
        original_hours * self.ratio_for(solver)
    }
}

/// Markdown calibration report
pub fn format_calibration(stats: &CalibrationStats) -> String {
    let mut lines = vec![
        "## Estimation Calibration".to_string(),
        String::new(),
        format!("**Sample size:** {} completions", stats.sample_size),
        format!("**Average ratio:** {:.2}x (actual/estimated)", stats.mean_ratio),
        format!("**Std deviation:** {:.2}", stats.std_dev),
        String::new(),
    ];

    if !stats.by_solver.is_empty() {
        lines.push("### By Solver".to_string());
        lines.push(String::new());
        lines.push("| Solver | Avg Ratio | Interpretation |".to_string());
        lines.push("|--------|-----------|----------------|".to_string());
        for (solver, ratio) in &stats.by_solver {
            let interpretation = if *ratio < 0.9 {
                "Faster than expected"
            } else if *ratio > 1.1 {
                "Slower than expected"
            } else {
                "On target"
            };
            lines.push(format!("| {solver} | {ratio:.2}x | {interpretation} |"));
        }
        lines.push(String::new());
    }

    if stats.mean_ratio > 1.1 {
        lines.push(format!(
            "> Estimates are optimistic: multiply by {:.1} for accuracy",
            stats.mean_ratio
        ));
    } else if stats.mean_ratio < 0.9 {
        lines.push("> Estimates are conservative: tasks complete faster than expected".to_string());
    } else {
        lines.push("> Estimates are calibrated: actual time matches estimates".to_string());
    }

    lines.join("\n")
}
