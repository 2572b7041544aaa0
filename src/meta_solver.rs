use std::fs;
use std::path::Path;

use anyhow::{ensure, Context, Result};
use log::{error, info};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::classifiers::Classifier;
use crate::datastructures::*;
use crate::preprocessing::{fit_pipeline, FeatureStage, PipelineStage};
use crate::presolving::PreSolver;
use crate::schedules::{combine_schedules, static_to_schedules};
use crate::selector::PairwiseClassifier;
use crate::validation::{CVStats, EvaluationError, Validator};

/// Everything a prediction needs: the fitted preprocessing pipeline, the
/// static pre-solving schedule (empty when no pre-solver was used), the
/// fitted selector and the configuration it was fit with.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct FittedModel {
    pub pipeline: Vec<PipelineStage>,
    pub presolving: Schedule,
    pub selector: PairwiseClassifier<Classifier>,
    pub config: Config,
}

/// Self-contained bundle for offline prediction: scenario metadata plus the
/// fitted model.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SavedModel {
    pub scenario: Scenario,
    pub model: FittedModel,
}

/// Fit/predict orchestrator and cross validation evaluator.
pub struct MetaSolver {
    seed: u64,
    overrides: Vec<(String, String)>,
}

impl MetaSolver {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            overrides: vec![],
        }
    }

    /// Attaches `key=value` configuration overrides applied on every fit.
    pub fn with_overrides(mut self, overrides: Vec<(String, String)>) -> Self {
        self.overrides = overrides;
        self
    }

    /// Fits preprocessing, the optional pre-solver and the selector on a
    /// training scenario.
    ///
    /// The pre-solver is only consulted for runtime objectives; its fixed
    /// schedule is captured into the returned model. Fitted models are
    /// read-only from here on.
    pub fn fit(
        &self,
        scenario: &Scenario,
        config: &Config,
        mut pre_solver: Option<&mut dyn PreSolver>,
    ) -> Result<FittedModel> {
        let config = if self.overrides.is_empty() {
            config.clone()
        } else {
            let config = config.with_overrides(&self.overrides)?;
            info!("overwritten configuration: {:?}", config);
            config
        };
        ensure!(
            scenario.algorithms.len() >= 2,
            "scenario needs at least 2 algorithms, got {}",
            scenario.algorithms.len()
        );
        scenario.check()?;
        let (pipeline, scenario) = fit_pipeline(scenario, &config)?;
        let presolving = match (scenario.performance_type, &mut pre_solver) {
            (PerformanceType::Runtime, Some(pre_solver)) => {
                pre_solver.fit(&scenario, &config)?;
                pre_solver.schedule()
            }
            _ => Schedule::default(),
        };
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let selector = PairwiseClassifier::fit(&scenario, &config, &mut rng)?;
        Ok(FittedModel {
            pipeline,
            presolving,
            selector,
            config,
        })
    }

    /// Predicts per-instance schedules, replaying the fitted pipeline
    /// (transform only, never refit) before pre-solving and selection.
    pub fn predict(
        &self,
        scenario: &Scenario,
        model: &FittedModel,
    ) -> Result<Schedules> {
        info!("predicting on {} instances", scenario.instances.len());
        let mut scenario = scenario.clone();
        for stage in &model.pipeline {
            scenario = stage.transform(&scenario)?;
        }
        let presolving =
            static_to_schedules(&model.presolving, &scenario.instances);
        let selected = model.selector.predict(&scenario)?;
        Ok(combine_schedules(&presolving, selected))
    }

    /// Cross validation: `folds` disjoint splits, a fresh fit per fold, the
    /// penalized score merged over all test partitions.
    ///
    /// The returned scalar is always lower-is-better so it can be handed
    /// directly to a minimizing configuration search. Evaluation faults
    /// (`EvaluationError`) abort the remaining folds and yield the
    /// worst-case penalty instead of an error; everything else propagates.
    pub fn run_cv(
        &self,
        config: &Config,
        scenario: &Scenario,
        folds: usize,
        new_pre_solver: Option<&dyn Fn() -> Box<dyn PreSolver>>,
    ) -> Result<f64> {
        ensure!(
            scenario.algorithms.len() >= 2,
            "scenario needs at least 2 algorithms, got {}",
            scenario.algorithms.len()
        );
        ensure!(folds >= 2, "cross validation needs at least 2 folds");
        let objective =
            match self.cross_validate(config, scenario, folds, new_pre_solver)
            {
                Ok(objective) => objective,
                Err(e) if e.downcast_ref::<EvaluationError>().is_some() => {
                    error!("{e}, falling back to the worst-case penalty");
                    let cutoff =
                        scenario.algorithm_cutoff_time.unwrap_or(0.0);
                    if scenario.maximize {
                        cutoff * -10.0
                    } else {
                        cutoff * 10.0
                    }
                }
                Err(e) => return Err(e),
            };
        Ok(if scenario.maximize {
            -objective
        } else {
            objective
        })
    }

    fn cross_validate(
        &self,
        config: &Config,
        scenario: &Scenario,
        folds: usize,
        new_pre_solver: Option<&dyn Fn() -> Box<dyn PreSolver>>,
    ) -> Result<f64> {
        let mut cv_stats = match scenario.performance_type {
            PerformanceType::Runtime => CVStats::new(
                scenario
                    .algorithm_cutoff_time
                    .ok_or(EvaluationError::MissingCutoff)?,
            ),
            PerformanceType::SolutionQuality => CVStats::new(0.0),
        };
        for fold in 1..=folds {
            info!("cv iteration {fold}");
            let (test_scenario, training_scenario) =
                scenario.get_split(fold, folds)?;
            let mut pre_solver = new_pre_solver.map(|new| new());
            let model = self.fit(
                &training_scenario,
                config,
                pre_solver.as_mut().map(|b| b.as_mut() as &mut dyn PreSolver),
            )?;
            let schedules = self.predict(&test_scenario, &model)?;
            let fold_stats = match test_scenario.performance_type {
                PerformanceType::Runtime => {
                    Validator.validate_runtime(&schedules, &test_scenario)?
                }
                PerformanceType::SolutionQuality => {
                    Validator.validate_quality(&schedules, &test_scenario)?
                }
            };
            cv_stats.merge(&fold_stats);
        }
        Ok(cv_stats.show())
    }
}

/// Writes the scenario metadata and fitted model as one json bundle.
pub fn save_model(
    path: &Path,
    scenario: &Scenario,
    model: &FittedModel,
) -> Result<()> {
    let bundle = SavedModel {
        scenario: scenario.metadata_only(),
        model: model.clone(),
    };
    serde_json::to_writer_pretty(
        fs::File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?,
        &bundle,
    )?;
    Ok(())
}

pub fn load_model(path: &Path) -> Result<SavedModel> {
    let bundle = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(serde_json::from_str(&bundle)?)
}

/// Predicts the schedule for a single unseen feature vector using a loaded
/// model bundle.
pub fn predict_feature_vec(
    solver: &MetaSolver,
    saved: &SavedModel,
    feature_vec: &[f64],
) -> Result<Schedule> {
    let scenario = saved.scenario.for_inference(feature_vec)?;
    let mut schedules = solver.predict(&scenario, &saved.model)?;
    schedules
        .remove(PSEUDO_INSTANCE)
        .context("no schedule was predicted for the pseudo instance")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    struct FixedPreSolver {
        schedule: Schedule,
    }

    impl PreSolver for FixedPreSolver {
        fn fit(&mut self, _: &Scenario, _: &Config) -> Result<()> {
            Ok(())
        }

        fn schedule(&self) -> Schedule {
            self.schedule.clone()
        }
    }

    #[test]
    fn test_fit_applies_overrides_to_a_copy() {
        let config = default_config();
        let solver = MetaSolver::new(0).with_overrides(vec![(
            "classifier".to_string(),
            "stump".to_string(),
        )]);
        let model = solver
            .fit(&tournament_scenario(), &config, None)
            .unwrap();
        assert_eq!(model.config.classifier, ClassifierKind::DecisionStump);
        assert_eq!(config, default_config());
    }

    #[test]
    fn test_fit_rejects_single_algorithm_before_any_work() {
        let mut scenario = tournament_scenario();
        scenario.algorithms.truncate(1);
        // shape mismatch would also fail, but the algorithm count fails first
        let err = MetaSolver::new(0)
            .fit(&scenario, &default_config(), None)
            .unwrap_err();
        assert!(err.to_string().contains("at least 2 algorithms"));
    }

    #[test]
    fn test_presolving_schedule_is_prepended() {
        let scenario = tournament_scenario();
        let solver = MetaSolver::new(0);
        let mut pre_solver = FixedPreSolver {
            schedule: vec![("algo2".to_string(), 10.0)],
        };
        let model = solver
            .fit(&scenario, &default_config(), Some(&mut pre_solver))
            .unwrap();
        assert_eq!(model.presolving, pre_solver.schedule);
        let schedules = solver.predict(&scenario, &model).unwrap();
        for schedule in schedules.values() {
            assert_eq!(schedule[0], ("algo2".to_string(), 10.0));
            assert_eq!(schedule.len(), 2);
        }
    }

    #[test]
    fn test_quality_objective_skips_the_pre_solver() {
        let mut scenario = tournament_scenario();
        scenario.performance_type = PerformanceType::SolutionQuality;
        scenario.algorithm_cutoff_time = None;
        let mut pre_solver = FixedPreSolver {
            schedule: vec![("algo1".to_string(), 10.0)],
        };
        let model = MetaSolver::new(0)
            .fit(&scenario, &default_config(), Some(&mut pre_solver))
            .unwrap();
        assert!(model.presolving.is_empty());
    }

    #[test]
    fn test_run_cv_falls_back_on_evaluation_errors() {
        let scenario = tournament_scenario();
        // a pre-solver scheduling an algorithm the scenario does not know
        // poisons evaluation without being a configuration error
        let make: Box<dyn Fn() -> Box<dyn PreSolver>> = Box::new(|| {
            Box::new(FixedPreSolver {
                schedule: vec![("ghost".to_string(), 10.0)],
            })
        });
        let objective = MetaSolver::new(0)
            .run_cv(&default_config(), &scenario, 2, Some(make.as_ref()))
            .unwrap();
        assert_eq!(objective, 1000.0);
    }

    #[test]
    fn test_run_cv_propagates_configuration_errors() {
        let scenario = tournament_scenario();
        // more folds than instances is a setup error, not an evaluation fault
        assert!(MetaSolver::new(0)
            .run_cv(&default_config(), &scenario, 7, None)
            .is_err());
    }
}
