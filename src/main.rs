use anyhow::Result;
use clap::Parser;
use log::{error, info};
use std::path::PathBuf;

use portfolio_selector::csv_parser;
use portfolio_selector::datastructures::*;
use portfolio_selector::meta_solver::{self, MetaSolver};

#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to the performance csv (instance,algorithm,performance)
    #[arg(long, required_unless_present = "load")]
    performance_csv: Option<PathBuf>,

    /// Path to the feature csv (instance,<feature columns>)
    #[arg(long, required_unless_present = "load")]
    feature_csv: Option<PathBuf>,

    /// Scenario objective
    #[arg(long, value_enum, default_value = "runtime")]
    objective: PerformanceType,

    /// Runtime cutoff in seconds (required for the runtime objective)
    #[arg(long)]
    runtime_cutoff: Option<f64>,

    /// Treat higher performance values as better
    #[arg(long)]
    maximize: bool,

    /// Number of cross validation folds
    #[arg(long, default_value_t = 10)]
    folds: usize,

    /// Random seed
    #[arg(long, default_value_t = 12345)]
    seed: u64,

    /// Fit on the full scenario and save the model bundle as json
    #[arg(long)]
    save: Option<PathBuf>,

    /// Load a model bundle and predict instead of fitting
    #[arg(long, requires = "feature_vec")]
    load: Option<PathBuf>,

    /// Feature vector of the instance to predict (requires --load)
    #[arg(long, num_args = 1.., requires = "load", allow_negative_numbers = true)]
    feature_vec: Vec<f64>,

    /// Configuration overrides as key=value pairs
    #[arg(long = "set", value_parser = parse_override)]
    set: Vec<(String, String)>,

    #[command(flatten)]
    verbosity: clap_verbosity_flag::Verbosity,
}

fn parse_override(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected key=value, got {s:?}"))
}

fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::new()
        .filter_level(args.verbosity.log_level_filter())
        .init();
    let solver = MetaSolver::new(args.seed).with_overrides(args.set.clone());

    if let Some(model_path) = &args.load {
        let saved = meta_solver::load_model(model_path)?;
        let schedule = meta_solver::predict_feature_vec(
            &solver,
            &saved,
            &args.feature_vec,
        )?;
        println!("selected schedule [(algorithm, budget)]: {schedule:?}");
        return Ok(());
    }

    let (Some(perf_path), Some(feat_path)) =
        (&args.performance_csv, &args.feature_csv)
    else {
        error!("either --load or both --performance-csv and --feature-csv are required");
        std::process::exit(exitcode::CONFIG);
    };
    let scenario = match csv_parser::read_scenario(
        perf_path,
        feat_path,
        args.objective,
        args.runtime_cutoff,
        args.maximize,
    ) {
        Ok(scenario) => scenario,
        Err(e) => {
            error!("{e:#}");
            std::process::exit(exitcode::CONFIG);
        }
    };
    let config = Config {
        seed: args.seed,
        ..Config::default()
    };

    if let Some(out) = &args.save {
        let model = solver.fit(&scenario, &config, None)?;
        meta_solver::save_model(out, &scenario, &model)?;
        info!("model bundle written to {}", out.display());
    } else {
        let objective = solver.run_cv(&config, &scenario, args.folds, None)?;
        println!("{objective}");
    }
    Ok(())
}
