use core::fmt;
use std::error::Error;

use log::{info, warn};

use crate::datastructures::*;

/// Faults the cross validation loop recovers from with the worst-case
/// penalty. Anything else raised during evaluation propagates.
#[derive(Debug, PartialEq, Eq)]
pub enum EvaluationError {
    MissingSchedule(Instance),
    UnknownAlgorithm {
        instance: Instance,
        algorithm: Algorithm,
    },
    MissingCutoff,
    EmptySchedule(Instance),
}

impl fmt::Display for EvaluationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EvaluationError::MissingSchedule(instance) => {
                write!(f, "no schedule was predicted for instance {instance}")
            }
            EvaluationError::UnknownAlgorithm {
                instance,
                algorithm,
            } => write!(
                f,
                "schedule for instance {instance} contains unknown algorithm \
                 {algorithm}"
            ),
            EvaluationError::MissingCutoff => {
                write!(f, "runtime scoring requires a cutoff time")
            }
            EvaluationError::EmptySchedule(instance) => {
                write!(f, "empty schedule for instance {instance}")
            }
        }
    }
}

impl Error for EvaluationError {}

/// Running totals of the penalized objective, merged across folds.
#[derive(Debug, Clone, PartialEq)]
pub struct CVStats {
    runtime_cutoff: f64,
    objective_sum: f64,
    n_instances: usize,
    timeouts: usize,
}

impl CVStats {
    /// A cutoff of `0` disables the penalty mechanism (quality objectives).
    pub fn new(runtime_cutoff: f64) -> Self {
        Self {
            runtime_cutoff,
            objective_sum: 0.0,
            n_instances: 0,
            timeouts: 0,
        }
    }

    fn add_solved(&mut self, value: f64) {
        self.objective_sum += value;
        self.n_instances += 1;
    }

    fn add_timeout(&mut self) {
        self.objective_sum += 10.0 * self.runtime_cutoff;
        self.n_instances += 1;
        self.timeouts += 1;
    }

    pub fn merge(&mut self, fold_stats: &CVStats) {
        self.objective_sum += fold_stats.objective_sum;
        self.n_instances += fold_stats.n_instances;
        self.timeouts += fold_stats.timeouts;
    }

    /// Logs the aggregate and returns the mean objective over all instances.
    pub fn show(&self) -> f64 {
        if self.n_instances == 0 {
            warn!("no instances were evaluated");
            return 0.0;
        }
        let objective = self.objective_sum / self.n_instances as f64;
        if self.runtime_cutoff > 0.0 {
            info!(
                "PAR10: {:.4} ({}/{} timeouts)",
                objective, self.timeouts, self.n_instances
            );
        } else {
            info!("mean quality: {:.4}", objective);
        }
        objective
    }
}

pub struct Validator;

impl Validator {
    /// Simulates each predicted schedule against the true runtimes.
    ///
    /// An algorithm solves the instance if its true runtime fits both its
    /// own budget and the time remaining under the global cutoff; the
    /// instance is then credited with the time spent up to and including the
    /// successful run. Instances no schedule entry solves are charged ten
    /// times the cutoff.
    pub fn validate_runtime(
        &self,
        schedules: &Schedules,
        test_scenario: &Scenario,
    ) -> Result<CVStats, EvaluationError> {
        let cutoff = test_scenario
            .algorithm_cutoff_time
            .ok_or(EvaluationError::MissingCutoff)?;
        let mut stats = CVStats::new(cutoff);
        for (row, instance) in test_scenario.instances.iter().enumerate() {
            let schedule = schedules
                .get(instance)
                .ok_or_else(|| {
                    EvaluationError::MissingSchedule(instance.clone())
                })?;
            let mut spent = 0.0;
            let mut solved_at = None;
            for (algorithm, budget) in schedule {
                let col = self.algorithm_index(
                    test_scenario,
                    instance,
                    algorithm,
                )?;
                let true_runtime = test_scenario.performance_data[[row, col]];
                let slot = budget.min(cutoff - spent);
                if true_runtime <= slot {
                    solved_at = Some(spent + true_runtime);
                    break;
                }
                spent += slot;
                if spent >= cutoff {
                    break;
                }
            }
            match solved_at {
                Some(time) => stats.add_solved(time),
                None => stats.add_timeout(),
            }
        }
        Ok(stats)
    }

    /// Scores the first scheduled algorithm's raw quality value, with the
    /// penalty mechanism disabled.
    pub fn validate_quality(
        &self,
        schedules: &Schedules,
        test_scenario: &Scenario,
    ) -> Result<CVStats, EvaluationError> {
        let mut stats = CVStats::new(0.0);
        for (row, instance) in test_scenario.instances.iter().enumerate() {
            let schedule = schedules
                .get(instance)
                .ok_or_else(|| {
                    EvaluationError::MissingSchedule(instance.clone())
                })?;
            let (algorithm, _) = schedule.first().ok_or_else(|| {
                EvaluationError::EmptySchedule(instance.clone())
            })?;
            let col =
                self.algorithm_index(test_scenario, instance, algorithm)?;
            stats.add_solved(test_scenario.performance_data[[row, col]]);
        }
        Ok(stats)
    }

    fn algorithm_index(
        &self,
        scenario: &Scenario,
        instance: &str,
        algorithm: &str,
    ) -> Result<usize, EvaluationError> {
        scenario
            .algorithms
            .iter()
            .position(|a| a == algorithm)
            .ok_or_else(|| EvaluationError::UnknownAlgorithm {
                instance: instance.to_string(),
                algorithm: algorithm.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use ndarray::arr2;

    fn runtime_scenario() -> Scenario {
        let mut scenario = scenario_with_features(arr2(&[[0.0], [1.0]]));
        scenario.performance_data = arr2(&[[30.0, 150.0], [150.0, 150.0]]);
        scenario.algorithm_cutoff_time = Some(100.0);
        scenario
    }

    fn schedule_for_all(
        scenario: &Scenario,
        schedule: Schedule,
    ) -> Schedules {
        scenario
            .instances
            .iter()
            .map(|instance| (instance.clone(), schedule.clone()))
            .collect()
    }

    #[test]
    fn test_par10_charges_ten_times_cutoff() {
        let scenario = runtime_scenario();
        let schedules = schedule_for_all(
            &scenario,
            vec![("algo1".to_string(), 101.0)],
        );
        let stats =
            Validator.validate_runtime(&schedules, &scenario).unwrap();
        // inst1 solved after 30s, inst2 hits the cutoff: 10 * 100
        assert_eq!(stats.objective_sum, 30.0 + 1000.0);
        assert_eq!(stats.timeouts, 1);
        assert_eq!(stats.show(), 515.0);
    }

    #[test]
    fn test_presolving_time_counts_toward_success() {
        let scenario = runtime_scenario();
        // 50s of algo2 first, then algo1 solves inst1 at 50 + 30
        let schedules = schedule_for_all(
            &scenario,
            vec![
                ("algo2".to_string(), 50.0),
                ("algo1".to_string(), 101.0),
            ],
        );
        let stats =
            Validator.validate_runtime(&schedules, &scenario).unwrap();
        assert_eq!(stats.objective_sum, 80.0 + 1000.0);
    }

    #[test]
    fn test_budget_limits_each_entry() {
        let mut scenario = runtime_scenario();
        scenario.performance_data = arr2(&[[30.0, 150.0], [60.0, 150.0]]);
        // 40s is not enough for inst2's 60s run even though the cutoff is
        let schedules = schedule_for_all(
            &scenario,
            vec![("algo1".to_string(), 40.0)],
        );
        let stats =
            Validator.validate_runtime(&schedules, &scenario).unwrap();
        assert_eq!(stats.objective_sum, 30.0 + 1000.0);
        assert_eq!(stats.timeouts, 1);
    }

    #[test]
    fn test_unknown_algorithm_is_an_evaluation_error() {
        let scenario = runtime_scenario();
        let schedules = schedule_for_all(
            &scenario,
            vec![("ghost".to_string(), 101.0)],
        );
        assert_eq!(
            Validator.validate_runtime(&schedules, &scenario).unwrap_err(),
            EvaluationError::UnknownAlgorithm {
                instance: "inst1".to_string(),
                algorithm: "ghost".to_string(),
            }
        );
    }

    #[test]
    fn test_missing_schedule_is_an_evaluation_error() {
        let scenario = runtime_scenario();
        assert!(matches!(
            Validator
                .validate_runtime(&Schedules::default(), &scenario)
                .unwrap_err(),
            EvaluationError::MissingSchedule(_)
        ));
    }

    #[test]
    fn test_quality_scores_first_entry() {
        let mut scenario = runtime_scenario();
        scenario.performance_type = PerformanceType::SolutionQuality;
        scenario.maximize = true;
        scenario.performance_data = arr2(&[[0.9, 0.2], [0.1, 0.8]]);
        let schedules = Schedules::from([
            ("inst1".to_string(), vec![("algo1".to_string(), 201.0)]),
            ("inst2".to_string(), vec![("algo2".to_string(), 201.0)]),
        ]);
        let stats =
            Validator.validate_quality(&schedules, &scenario).unwrap();
        assert!((stats.show() - 0.85).abs() < 1e-9);
        assert_eq!(stats.timeouts, 0);
    }

    #[test]
    fn test_merge_accumulates_folds() {
        let scenario = runtime_scenario();
        let schedules = schedule_for_all(
            &scenario,
            vec![("algo1".to_string(), 101.0)],
        );
        let fold =
            Validator.validate_runtime(&schedules, &scenario).unwrap();
        let mut total = CVStats::new(100.0);
        total.merge(&fold);
        total.merge(&fold);
        assert_eq!(total.n_instances, 4);
        assert_eq!(total.show(), 515.0);
    }
}
