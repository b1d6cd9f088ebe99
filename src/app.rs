//! Application entry: logging, argument parsing, command dispatch.

pub mod pipeline;

use std::collections::HashMap;
use std::time::Duration;

use clap::Parser;
use log::info;
use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;

use crate::cli::{AnalyzeArgs, Cli, Command, ReportArgs, SimulateArgs};
use crate::domain::{ContactSeekConfig, PlateLayout, WellId};
use crate::error::AppError;
use crate::fit::FitOptions;
use crate::io::{PositionFile, load_results};
use crate::report::{format_batch_summary, format_results_table};
use crate::rig::{SimRig, SimRigConfig, SimSample};
use self::pipeline::{AnalyzeRequest, BatchConfig, analyze_log, run_batch};

pub fn run() -> Result<(), AppError> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Command::Simulate(args) => simulate(args),
        Command::Analyze(args) => analyze(args),
        Command::Report(args) => report(args),
    }
}

fn init_logging() {
    // Ignore re-init: tests and embedding callers may have their own logger.
    let _ = simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );
}

fn simulate(args: SimulateArgs) -> Result<(), AppError> {
    let wells = args.selection.resolve()?;
    let stiff_wells = args
        .stiff_wells
        .iter()
        .map(|name| name.parse().map_err(|e: String| AppError::new(2, e)))
        .collect::<Result<Vec<WellId>, AppError>>()?;

    let layout = PlateLayout::default();
    let rig_config = SimRigConfig {
        layout,
        noise_sigma_n: args.noise,
        seed: args.seed,
        ..SimRigConfig::default()
    };

    // Draw each well's synthetic sample from the seeded RNG: surfaces a few
    // millimeters down, stiffness soft enough to indent a full millimeter
    // without saturating. Rigid wells get a stiffness that saturates within a
    // handful of steps.
    let mut rng = StdRng::seed_from_u64(args.seed);
    let mut samples = HashMap::new();
    for &well in &wells {
        let sample = if stiff_wells.contains(&well) {
            SimSample {
                surface_depth_mm: rng.gen_range(2.0..4.0),
                stiffness: 2000.0,
            }
        } else {
            SimSample {
                surface_depth_mm: rng.gen_range(2.0..4.0),
                stiffness: rng.gen_range(2.0..6.0),
            }
        };
        samples.insert(well, sample);
    }

    let mut rig = SimRig::new(rig_config, samples)?
        .with_position_file(PositionFile::new(&args.position));

    let batch = BatchConfig {
        wells,
        poisson: args.poisson,
        trials: args.trials,
        trial_interval: Duration::from_secs(args.interval_secs),
        trace_path: args.trace.clone(),
        results_path: args.results.clone(),
    };

    info!(
        "simulated batch: {} wells, {} trial(s), trace -> '{}', results -> '{}'",
        batch.wells.len(),
        batch.trials.max(1),
        batch.trace_path.display(),
        batch.results_path.display()
    );

    let results = run_batch(
        &mut rig,
        &layout,
        &ContactSeekConfig::default(),
        &FitOptions::default(),
        &batch,
    )?;

    print!("{}", format_batch_summary(&results));
    Ok(())
}

fn analyze(args: AnalyzeArgs) -> Result<(), AppError> {
    let wells = if args.all {
        None
    } else {
        Some(args.selection.resolve()?)
    };

    let request = AnalyzeRequest {
        trace_path: args.trace,
        wells,
        trial: args.trial,
        poisson: args.poisson,
        results_path: args.results,
    };

    let results = analyze_log(&request, &FitOptions::default())?;
    print!("{}", format_results_table(&results));
    Ok(())
}

fn report(args: ReportArgs) -> Result<(), AppError> {
    let results = load_results(&args.results)?;
    if results.is_empty() {
        return Err(AppError::new(3, "Results log is empty."));
    }
    print!("{}", format_results_table(&results));
    Ok(())
}
