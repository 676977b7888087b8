//! Arena Simulator CLI
//!
//! Run seeded Arena experiments with simulated agents and ledger faults.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use arena_core::{load_config, EventSink, SledEventStore};
use arena_sim::scenarios::ScenarioId;
use arena_sim::{ScenarioResult, ScenarioRunner, SimExport};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Arena Deterministic Simulation CLI
#[derive(Parser, Debug)]
#[command(name = "arena-sim")]
#[command(about = "Run seeded multi-agent economy experiments", long_about = None)]
struct Args {
    /// Master seed for determinism
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Number of agents
    #[arg(short, long, default_value = "16")]
    agents: usize,

    /// Number of rounds (overrides the config file)
    #[arg(short, long)]
    rounds: Option<u32>,

    /// Scenario to run (baseline, mixed_priming, flaky, elimination, unreachable_ledger, all)
    #[arg(short = 'S', long, default_value = "baseline")]
    scenario: String,

    /// TOML file with the run configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Probability of injected faults in the flaky scenario
    #[arg(long, default_value = "0.1")]
    fault_rate: f64,

    /// Persist rounds, transfers and messages to a sled database at this path
    #[arg(long)]
    store: Option<PathBuf>,

    /// Export each run to JSON (the scenario name is appended when running several)
    #[arg(long)]
    export: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,
}

fn export_path(base: &Path, scenario: ScenarioId, several: bool) -> PathBuf {
    if !several {
        return base.to_path_buf();
    }
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "arena".to_string());
    base.with_file_name(format!("{}-{}.json", stem, scenario.name()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if !args.json {
        info!("Arena Simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        vec![args.scenario.parse()?]
    };

    let mut arena = match &args.config {
        Some(path) => load_config(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Default::default(),
    };
    if let Some(rounds) = args.rounds {
        arena.rounds = rounds;
    }
    arena.validate()?;

    let mut runner = ScenarioRunner::new(args.seed, args.agents)
        .with_config(arena)
        .with_fault_rate(args.fault_rate);
    if let Some(path) = &args.store {
        let store = SledEventStore::open(path)
            .with_context(|| format!("opening event store at {}", path.display()))?;
        runner = runner.with_sink(Arc::new(store) as Arc<dyn EventSink>);
    }

    let mut all_results: Vec<ScenarioResult> = Vec::new();
    for scenario in &scenarios {
        let result = runner.run(*scenario).await;

        if let Some(base) = &args.export {
            let path = export_path(base, *scenario, scenarios.len() > 1);
            SimExport::from_result(&result)
                .write_to_file(&path)
                .with_context(|| format!("writing export to {}", path.display()))?;
            info!("Exported {} to {}", scenario.name(), path.display());
        }

        if !args.json {
            if result.passed {
                info!("✓ {} (seed={}) PASSED", scenario.name(), args.seed);
                if let Some(report) = &result.report {
                    let summary = &report.analysis.summary;
                    info!(
                        "  rounds={} gini={:.4} transfers={} volume={} eliminated={}",
                        summary.rounds,
                        summary.final_gini,
                        summary.applied_transfers,
                        summary.total_volume,
                        summary.eliminations
                    );
                }
            } else {
                error!(
                    "✗ {} (seed={}) FAILED: {}",
                    scenario.name(),
                    args.seed,
                    result.failure_reason.as_deref().unwrap_or("unknown")
                );
            }
        }

        all_results.push(result);
    }

    let total = all_results.len();
    let failed_count = all_results.iter().filter(|r| !r.passed).count();

    if args.json {
        let summary = serde_json::json!({
            "total": total,
            "passed": total - failed_count,
            "failed": failed_count,
            "results": all_results.iter().map(|r| {
                let analysis = r.report.as_ref().map(|report| &report.analysis.summary);
                serde_json::json!({
                    "scenario": r.scenario.name(),
                    "seed": r.seed,
                    "passed": r.passed,
                    "rounds": r.rounds_completed,
                    "final_gini": analysis.map(|s| s.final_gini),
                    "eliminations": analysis.map(|s| s.eliminations),
                    "violations": r.violations,
                    "failure_reason": r.failure_reason,
                })
            }).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        if failed_count == 0 {
            info!("✅ All {} scenario runs passed!", total);
        } else {
            error!("❌ {}/{} scenario runs failed!", failed_count, total);
        }
    }

    if failed_count > 0 {
        bail!("{} of {} scenario runs failed", failed_count, total);
    }
    Ok(())
}
