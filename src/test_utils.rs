use ndarray::{arr2, Array2};

use crate::datastructures::*;

pub fn default_config() -> Config {
    Config::default()
}

/// Scenario with the given feature matrix, two algorithms and constant
/// performance values. For tests that only look at features.
pub fn scenario_with_features(features: Array2<f64>) -> Scenario {
    let n = features.nrows();
    let feature_names: Vec<String> =
        (1..=features.ncols()).map(|c| format!("f{c}")).collect();
    Scenario {
        instances: (1..=n).map(|i| format!("inst{i}")).collect(),
        algorithms: vec!["algo1".to_string(), "algo2".to_string()],
        feature_steps: vec![FeatureStep {
            name: "all_features".to_string(),
            features: feature_names.clone(),
            default: true,
        }],
        feature_names,
        feature_data: features,
        performance_data: Array2::zeros((n, 2)),
        performance_type: PerformanceType::Runtime,
        algorithm_cutoff_time: Some(100.0),
        maximize: false,
    }
}

/// Three algorithms, six instances, each algorithm best on two of them.
pub fn tournament_scenario() -> Scenario {
    let performance = arr2(&[
        [1.0, 10.0, 20.0],
        [10.0, 1.0, 20.0],
        [20.0, 10.0, 1.0],
        [1.0, 20.0, 10.0],
        [10.0, 20.0, 1.0],
        [20.0, 1.0, 10.0],
    ]);
    let features = arr2(&[
        [0.0, 1.0],
        [1.0, 0.0],
        [2.0, 1.0],
        [0.0, 0.0],
        [2.0, 0.0],
        [1.0, 1.0],
    ]);
    Scenario {
        algorithms: vec![
            "algo1".to_string(),
            "algo2".to_string(),
            "algo3".to_string(),
        ],
        performance_data: performance,
        ..scenario_with_features(features)
    }
}
