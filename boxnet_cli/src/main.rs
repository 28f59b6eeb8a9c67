use std::{
    fs,
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::{Context, Result};
use boxnet_core::{
    CornerWorld, ExecutionReport, GridWorld, World, WorldSnapshot,
    corner_world::EMPTY,
    execute_plan, parse_plan,
    planner::RandomPlanner,
    scenario::{Scenario, load_scenario},
    trial::{Protocol, TrialConfig, TrialOutcome, run_trial},
};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(version, about = "Replay plans and run baseline trials in BoxNet worlds", long_about = None)]
struct Args {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse a plan file and execute it against a fresh world
    Replay {
        #[command(flatten)]
        layout: LayoutArgs,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Plan reply: one action per line, or a JSON object or array
        #[arg(value_name = "PLAN_FILE")]
        plan: PathBuf,
    },
    /// Run trials with the seeded random baseline planner
    Baseline {
        #[command(flatten)]
        layout: LayoutArgs,

        #[arg(short, long, default_value_t = Protocol::Centralized)]
        protocol: Protocol,

        /// Seed of the first trial; trial `n` uses `seed + n`
        #[arg(long, default_value_t = 0)]
        seed: u64,

        #[arg(short, long, default_value_t = 10)]
        trials: usize,

        /// Trial settings (JSON)
        #[arg(short, long, value_name = "CONFIG_FILE")]
        config: Option<PathBuf>,

        /// Print every outcome as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(clap::Args, Debug)]
struct LayoutArgs {
    /// Built-in layout
    #[arg(short, long, value_enum, default_value_t = WorldChoice::Grid)]
    world: WorldChoice,

    /// Scenario file used instead of the built-in layout
    #[arg(short, long, value_name = "SCENARIO_FILE")]
    scenario: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum WorldChoice {
    /// 2x4 grid, one agent per cell
    Grid,
    /// 3x5 grid with 2x2 agent regions and goal clearing
    Corridor,
    /// 2x2 corner world
    Corner,
}

/// Where fresh worlds come from.
enum Layout {
    Builtin(WorldChoice),
    File(Scenario),
}

impl Layout {
    fn load(args: &LayoutArgs) -> Result<Self> {
        let Some(path) = &args.scenario else {
            return Ok(Layout::Builtin(args.world));
        };
        let scenario = load_scenario(path)
            .with_context(|| format!("failed to load scenario {}", path.display()))?;
        Ok(Layout::File(scenario))
    }

    fn build(&self) -> Result<Box<dyn World>> {
        Ok(match self {
            Layout::Builtin(WorldChoice::Grid) => Box::new(GridWorld::boxnet1()),
            Layout::Builtin(WorldChoice::Corridor) => Box::new(GridWorld::corridor()),
            Layout::Builtin(WorldChoice::Corner) => Box::new(CornerWorld::boxnet2()),
            Layout::File(scenario) => scenario.build().context("invalid scenario")?,
        })
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    setup_logging(args.verbose);

    match args.command {
        Command::Replay { layout, json, plan } => replay(&layout, &plan, json),
        Command::Baseline {
            layout,
            protocol,
            seed,
            trials,
            config,
            json,
        } => baseline(&layout, protocol, seed, trials, config.as_deref(), json),
    }
}

fn replay(layout: &LayoutArgs, plan_file: &Path, json: bool) -> Result<ExitCode> {
    let text = fs::read_to_string(plan_file)
        .with_context(|| format!("failed to read plan {}", plan_file.display()))?;
    let mut world = Layout::load(layout)?.build()?;

    let parsed = parse_plan(&text);
    for diagnostic in &parsed.diagnostics {
        warn!(
            line = diagnostic.line_no,
            reason = %diagnostic.reason,
            "skipped plan line: {}",
            diagnostic.line
        );
    }
    info!(actions = parsed.plan.len(), "plan parsed");
    let report = execute_plan(world.as_mut(), &parsed.plan);
    let success = report.success;

    if json {
        let summary = serde_json::json!({
            "report": &report,
            "diagnostics": &parsed.diagnostics,
            "success_rate": world.success_rate(),
            "complete": world.is_complete(),
            "state": world.snapshot(),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_report(&report, parsed.plan.len());
        print_state(&world.snapshot());
        println!(
            "success rate: {:.1}%  complete: {}",
            world.success_rate() * 100.0,
            if world.is_complete() { "yes" } else { "no" }
        );
    }

    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn baseline(
    layout: &LayoutArgs,
    protocol: Protocol,
    seed: u64,
    trials: usize,
    config_file: Option<&Path>,
    json: bool,
) -> Result<ExitCode> {
    let config = match config_file {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            TrialConfig::from_json(&text)
                .with_context(|| format!("malformed config {}", path.display()))?
        }
        None => TrialConfig::default(),
    };
    let layout = Layout::load(layout)?;

    let mut outcomes: Vec<TrialOutcome> = Vec::with_capacity(trials);
    for trial in 0..trials {
        let mut world = layout.build()?;
        let mut planner = RandomPlanner::new(seed.wrapping_add(trial as u64));
        let outcome = run_trial(protocol, world.as_mut(), &mut planner, &config)
            .with_context(|| format!("trial {trial} aborted"))?;
        if !json {
            println!(
                "trial {trial:>3}: success rate {:>5.1}%  steps {:>2}  calls {:>2}  {}",
                outcome.success_rate * 100.0,
                outcome.steps,
                outcome.api_calls,
                if outcome.complete { "complete" } else { "incomplete" }
            );
        }
        outcomes.push(outcome);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&outcomes)?);
    } else if !outcomes.is_empty() {
        let mean =
            outcomes.iter().map(|o| o.success_rate).sum::<f64>() / outcomes.len() as f64;
        let complete = outcomes.iter().filter(|o| o.complete).count();
        println!(
            "{protocol}: mean success rate {:.1}%, {complete}/{} complete",
            mean * 100.0,
            outcomes.len()
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn print_report(report: &ExecutionReport, total: usize) {
    println!("executed {}/{} actions", report.applied, total);
    if let Some(failure) = &report.failure {
        println!(
            "halted at action {}: {} ({})",
            failure.index + 1,
            failure.action,
            failure.error
        );
    }
}

fn print_state(state: &WorldSnapshot) {
    match state {
        WorldSnapshot::Grid(grid) => {
            for b in &grid.boxes {
                let positions: Vec<String> = b.positions.iter().map(ToString::to_string).collect();
                println!("{} box: {}", b.color, positions.join(", "));
            }
        }
        WorldSnapshot::Corner(corner) => {
            for c in &corner.corners {
                println!(
                    "corner {}: {}",
                    c.position,
                    c.occupant.as_deref().unwrap_or(EMPTY)
                );
            }
        }
    }
    for (color, targets) in state.goals() {
        let targets: Vec<String> = targets.iter().map(ToString::to_string).collect();
        println!("{color} goal: [{}]", targets.join(", "));
    }
}
