use std::path::Path;

use portfolio_selector::csv_parser::read_scenario;
use portfolio_selector::datastructures::*;
use portfolio_selector::meta_solver::MetaSolver;

#[test]
fn test_runtime_cross_validation_on_separable_scenario() {
    // f1 encodes the better algorithm exactly, so a stump selector picks the
    // 1-second algorithm for every test instance in every fold
    let scenario = read_scenario(
        Path::new("data/test/cv_perf.csv"),
        Path::new("data/test/cv_features.csv"),
        PerformanceType::Runtime,
        Some(100.0),
        false,
    )
    .unwrap();
    let config = Config {
        classifier: ClassifierKind::DecisionStump,
        ..Config::default()
    };
    let objective = MetaSolver::new(42)
        .run_cv(&config, &scenario, 4, None)
        .unwrap();
    assert_eq!(objective, 1.0);
}

#[test]
fn test_quality_cross_validation_flips_the_sign() {
    let scenario = read_scenario(
        Path::new("data/test/quality_perf.csv"),
        Path::new("data/test/features.csv"),
        PerformanceType::SolutionQuality,
        None,
        true,
    )
    .unwrap();
    let config = Config {
        classifier: ClassifierKind::DecisionStump,
        ..Config::default()
    };
    let objective = MetaSolver::new(42)
        .run_cv(&config, &scenario, 2, None)
        .unwrap();
    // fold 1 trains on {inst2, inst4} (algo2 better on both), fold 2 on
    // {inst1, inst3} (tie weights leave only inst1, algo1 better); the mean
    // achieved quality is (0.2 + 0.5 + 0.1 + 0.3) / 4, negated for a
    // minimizing caller
    assert!((objective + 0.275).abs() < 1e-9);
}

#[test]
fn test_cross_validation_rejects_single_algorithm_scenarios() {
    let mut scenario = read_scenario(
        Path::new("data/test/cv_perf.csv"),
        Path::new("data/test/cv_features.csv"),
        PerformanceType::Runtime,
        Some(100.0),
        false,
    )
    .unwrap();
    scenario.algorithms.truncate(1);
    assert!(MetaSolver::new(42)
        .run_cv(&Config::default(), &scenario, 4, None)
        .is_err());
}
