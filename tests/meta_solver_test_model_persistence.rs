use std::path::Path;

use portfolio_selector::csv_parser::read_scenario;
use portfolio_selector::datastructures::*;
use portfolio_selector::meta_solver::{
    load_model, predict_feature_vec, save_model, MetaSolver, SavedModel,
};

#[test]
fn test_saved_model_predicts_like_the_fitted_one() {
    let scenario = read_scenario(
        Path::new("data/test/runtime_perf.csv"),
        Path::new("data/test/features.csv"),
        PerformanceType::Runtime,
        Some(200.0),
        false,
    )
    .unwrap();
    let config = Config {
        classifier: ClassifierKind::DecisionStump,
        ..Config::default()
    };
    let solver = MetaSolver::new(42);
    let model = solver.fit(&scenario, &config, None).unwrap();

    let path =
        std::env::temp_dir().join("portfolio_selector_persistence_test.json");
    save_model(&path, &scenario, &model).unwrap();
    let loaded = load_model(&path).unwrap();
    std::fs::remove_file(&path).ok();

    // the bundle carries no training data rows
    assert!(loaded.scenario.instances.is_empty());
    assert_eq!(loaded.scenario.feature_names, scenario.feature_names);

    let in_memory = SavedModel {
        scenario: scenario.metadata_only(),
        model,
    };
    for feature_vec in [[0.0, 1.0], [1.0, 0.0], [0.4, 0.2]] {
        let from_disk =
            predict_feature_vec(&solver, &loaded, &feature_vec).unwrap();
        let from_memory =
            predict_feature_vec(&solver, &in_memory, &feature_vec).unwrap();
        assert_eq!(from_disk, from_memory);
        assert!(scenario.algorithms.contains(&from_disk[0].0));
    }

    // f1 separates the training labels, so a low f1 selects algo1
    let schedule =
        predict_feature_vec(&solver, &loaded, &[0.0, 1.0]).unwrap();
    assert_eq!(schedule, [("algo1".to_string(), 201.0)]);
}
