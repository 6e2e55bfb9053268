//! planmux CLI - Multi-Objective Task Planner
//!
//! Collaborator-layer binary: loads JSON requests and snapshots from disk,
//! feeds them to the pure planning and dispatch cores, and prints the
//! results.

mod demo;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::collections::HashMap;
use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use planmux_core::{ObjectiveWeights, PlanRequest, RateLimitRecord, SystemClock};
use planmux_dispatch::{
    format_availability, format_calibration, format_matches, read_completion_log,
    AvailabilityProbe, HistoryCalibrator, InMemoryRateLimitView, SolverMatcher, SolverRegistry,
};
use planmux_solver::{Planner, SolveOptions};

#[derive(Parser)]
#[command(name = "planmux")]
#[command(author, version, about = "Multi-objective task planner and solver dispatcher", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Objective {
    Speed,
    Coverage,
    Urgency,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the Pareto plan, recommendation and immediate batch
    Plan {
        /// Request JSON file
        #[arg(short, long)]
        input: PathBuf,

        /// Prioritize one objective (doubles its weight, halves the others)
        #[arg(short, long)]
        objective: Option<Objective>,

        /// Also emit machine-readable JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Select the immediate dispatch batch only
    Batch {
        /// Request JSON file
        #[arg(short, long)]
        input: PathBuf,

        /// Max parallel tasks
        #[arg(short = 'p', long, default_value = "15")]
        max_parallel: usize,

        /// Also emit machine-readable JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Rank tasks by the downstream work they unlock
    Value {
        /// Request JSON file
        #[arg(short, long)]
        input: PathBuf,

        /// Number of tasks to show
        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// Also emit machine-readable JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Assign a solver to every task in the request
    Match {
        /// Request JSON file
        #[arg(short, long)]
        input: PathBuf,

        /// Rate-limit snapshot (JSON array of records)
        #[arg(long)]
        ratelimit: Option<PathBuf>,

        /// Completion log (JSON lines) for history-weighted scoring
        #[arg(long)]
        history: Option<PathBuf>,

        /// Account for rate-limit lookups
        #[arg(long, default_value = "default")]
        account: String,

        /// Consider solvers even when they are unavailable
        #[arg(long)]
        include_unavailable: bool,

        /// Also emit machine-readable JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show solver availability from a rate-limit snapshot
    Availability {
        /// Rate-limit snapshot (JSON array of records)
        #[arg(long)]
        ratelimit: Option<PathBuf>,

        /// Account for rate-limit lookups
        #[arg(long, default_value = "default")]
        account: String,

        /// Also emit machine-readable JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Calibration statistics from the completion log
    Calibrate {
        /// Completion log (JSON lines)
        #[arg(short = 'H', long)]
        history: PathBuf,

        /// Estimate to calibrate instead of printing the report
        #[arg(long)]
        hours: Option<f64>,

        /// Solver whose ratio should be applied
        #[arg(long)]
        solver: Option<String>,

        /// Also emit machine-readable JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Run the planner on the built-in demo data
    Demo,
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Plan {
            input,
            objective,
            json,
        } => cmd_plan(&input, objective, json),
        Commands::Batch {
            input,
            max_parallel,
            json,
        } => cmd_batch(&input, max_parallel, json),
        Commands::Value { input, limit, json } => cmd_value(&input, limit, json),
        Commands::Match {
            input,
            ratelimit,
            history,
            account,
            include_unavailable,
            json,
        } => cmd_match(
            &input,
            ratelimit.as_deref(),
            history.as_deref(),
            &account,
            include_unavailable,
            json,
        ),
        Commands::Availability {
            ratelimit,
            account,
            json,
        } => cmd_availability(ratelimit.as_deref(), &account, json),
        Commands::Calibrate {
            history,
            hours,
            solver,
            json,
        } => cmd_calibrate(&history, hours, solver.as_deref(), json),
        Commands::Demo => cmd_demo(),
    }
}

fn load_request(path: &Path) -> Result<PlanRequest> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read request file {}", path.display()))?;
    let request: PlanRequest = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse request file {}", path.display()))?;
    tracing::debug!(
        tasks = request.tasks.len(),
        goals = request.goals.len(),
        "loaded plan request"
    );
    Ok(request)
}

fn load_rate_limits(path: Option<&Path>) -> Result<InMemoryRateLimitView> {
    match path {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read rate-limit snapshot {}", path.display()))?;
            let records: Vec<RateLimitRecord> = serde_json::from_str(&text)
                .with_context(|| format!("failed to parse rate-limit snapshot {}", path.display()))?;
            Ok(InMemoryRateLimitView::from_records(records))
        }
        None => Ok(InMemoryRateLimitView::new()),
    }
}

fn load_history(path: Option<&Path>) -> Result<HistoryCalibrator> {
    match path {
        Some(path) => {
            let file = fs::File::open(path)
                .with_context(|| format!("failed to open completion log {}", path.display()))?;
            let records = read_completion_log(BufReader::new(file))
                .with_context(|| format!("failed to parse completion log {}", path.display()))?;
            tracing::debug!(records = records.len(), "loaded completion history");
            Ok(HistoryCalibrator::from_records(&records))
        }
        None => Ok(HistoryCalibrator::default()),
    }
}

fn cmd_plan(input: &Path, objective: Option<Objective>, json: bool) -> Result<()> {
    let mut request = load_request(input)?;

    if let Some(objective) = objective {
        let mut weights = ObjectiveWeights {
            speed: 0.5,
            coverage: 0.5,
            urgency: 0.5,
        };
        match objective {
            Objective::Speed => weights.speed = 2.0,
            Objective::Coverage => weights.coverage = 2.0,
            Objective::Urgency => weights.urgency = 2.0,
        }
        request.weights = weights;
    }

    let result = Planner::new(request).plan(&SolveOptions::default())?;
    println!("{}", result.explanation);

    if json {
        let recommended = result.recommended.as_ref();
        let output = serde_json::json!({
            "recommended": {
                "tasks": recommended.map(|p| p.sequence.clone()).unwrap_or_default(),
                "hours": recommended.map(|p| p.total_hours).unwrap_or(0),
                "goals_completed": recommended.map(|p| p.goals_completed.clone()).unwrap_or_default(),
            },
            "immediate_batch": result.immediate_batch,
            "pareto_count": result.pareto_paths.len(),
        });
        println!();
        println!("{}", serde_json::to_string_pretty(&output)?);
    }
    Ok(())
}

fn cmd_batch(input: &Path, max_parallel: usize, json: bool) -> Result<()> {
    let request = load_request(input)?.max_parallel(max_parallel);
    let summaries: HashMap<String, String> = request
        .tasks
        .iter()
        .map(|t| (t.id.clone(), t.summary.clone()))
        .collect();

    let result = Planner::new(request).plan(&SolveOptions::default())?;

    println!("## Immediate Batch ({} tasks)", result.immediate_batch.len());
    for task_id in &result.immediate_batch {
        let summary = summaries.get(task_id).map(String::as_str).unwrap_or("");
        println!("- {task_id}: {summary}");
    }

    if json {
        println!();
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "batch": result.immediate_batch
            }))?
        );
    }
    Ok(())
}

fn cmd_value(input: &Path, limit: usize, json: bool) -> Result<()> {
    let request = load_request(input)?;
    let impacts = Planner::new(request).highest_value(limit)?;

    println!("## Value-Blocking Analysis");
    println!();
    println!("Tasks ranked by how much downstream value they unlock:");
    println!();
    for (rank, impact) in impacts.iter().enumerate() {
        println!("### {}. {}: {}", rank + 1, impact.task_id, impact.summary);
        println!("   - Value Score: **{}/100**", impact.value_score);
        println!(
            "   - Blocks {} tasks ({}h of work)",
            impact.blocked_tasks.len(),
            impact.blocked_hours
        );
        if !impact.blocked_goals.is_empty() {
            println!("   - Required for goals: {}", impact.blocked_goals.join(", "));
        }
        println!();
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&impacts)?);
    }
    Ok(())
}

fn cmd_match(
    input: &Path,
    ratelimit: Option<&Path>,
    history: Option<&Path>,
    account: &str,
    include_unavailable: bool,
    json: bool,
) -> Result<()> {
    let request = load_request(input)?;
    let view = load_rate_limits(ratelimit)?;
    let calibrator = load_history(history)?;

    let registry = SolverRegistry::builtin();
    let clock = SystemClock;
    let probe = AvailabilityProbe::new(&registry, &view, &clock, account);
    let matcher = SolverMatcher::new(&registry, &probe, &calibrator);

    // Solver hints on the issue records act as explicit tags
    let tags_by_id: HashMap<String, Vec<String>> = request
        .tasks
        .iter()
        .filter_map(|task| {
            task.solver_hint
                .as_ref()
                .map(|hint| (task.id.clone(), vec![hint.clone()]))
        })
        .collect();

    let matches = matcher.match_all(&request.tasks, &tags_by_id, !include_unavailable);
    println!("{}", format_matches(&request.tasks, &matches));

    if json {
        println!();
        println!("{}", serde_json::to_string_pretty(&matches)?);
    }
    Ok(())
}

fn cmd_availability(ratelimit: Option<&Path>, account: &str, json: bool) -> Result<()> {
    let view = load_rate_limits(ratelimit)?;
    let registry = SolverRegistry::builtin();
    let clock = SystemClock;
    let probe = AvailabilityProbe::new(&registry, &view, &clock, account);

    let verdicts = probe.check_all();
    println!("{}", format_availability(&verdicts));

    if json {
        println!();
        println!("{}", serde_json::to_string_pretty(&verdicts)?);
    }
    Ok(())
}

fn cmd_calibrate(history: &Path, hours: Option<f64>, solver: Option<&str>, json: bool) -> Result<()> {
    let calibrator = load_history(Some(history))?;

    match hours {
        Some(hours) => {
            let calibrated = calibrator.calibrate(hours, solver);
            match solver {
                Some(solver) => {
                    println!("{hours}h -> {calibrated:.1}h (solver {solver})")
                }
                None => println!("{hours}h -> {calibrated:.1}h"),
            }
        }
        None => println!("{}", format_calibration(calibrator.stats())),
    }

    if json {
        println!();
        println!("{}", serde_json::to_string_pretty(calibrator.stats())?);
    }
    Ok(())
}

fn cmd_demo() -> Result<()> {
    let result = Planner::new(demo::demo_request()).plan(&SolveOptions::default())?;
    println!("{}", result.explanation);
    Ok(())
}
