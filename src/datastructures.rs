use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use anyhow::{ensure, Context, Result};
use clap::ValueEnum;
use log::warn;
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

pub type Algorithm = String;
pub type Instance = String;

/// Ordered list of (algorithm, time budget) pairs to run on one instance.
pub type Schedule = Vec<(Algorithm, f64)>;
/// Per-instance schedules, the externally visible prediction artifact.
pub type Schedules = HashMap<Instance, Schedule>;

/// Instance name used when predicting for a single unseen feature vector.
pub const PSEUDO_INSTANCE: &str = "pseudo_instance";

#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, ValueEnum,
)]
pub enum PerformanceType {
    #[value(name = "runtime")]
    Runtime,
    #[value(name = "solution_quality")]
    SolutionQuality,
}

/// Named group of features that can be switched on or off together.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FeatureStep {
    pub name: String,
    pub features: Vec<String>,
    pub default: bool,
}

/// A benchmark dataset: per-instance feature vectors, per-instance
/// per-algorithm performance values and the objective metadata.
///
/// `feature_data` and `performance_data` are row-aligned with `instances`;
/// `performance_data` columns are aligned with `algorithms`. Feature values
/// may be NaN before imputation.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Scenario {
    pub instances: Vec<Instance>,
    pub algorithms: Vec<Algorithm>,
    pub feature_names: Vec<String>,
    pub feature_data: Array2<f64>,
    pub performance_data: Array2<f64>,
    pub performance_type: PerformanceType,
    pub algorithm_cutoff_time: Option<f64>,
    pub maximize: bool,
    pub feature_steps: Vec<FeatureStep>,
}

impl Scenario {
    pub fn check(&self) -> Result<()> {
        let n = self.instances.len();
        ensure!(
            self.instances.iter().collect::<HashSet<_>>().len() == n,
            "instance names must be unique"
        );
        ensure!(
            self.algorithms.iter().collect::<HashSet<_>>().len()
                == self.algorithms.len(),
            "algorithm names must be unique"
        );
        ensure!(
            self.feature_data.nrows() == n
                && self.performance_data.nrows() == n,
            "feature and performance rows must match the instance list \
             ({} instances, {} feature rows, {} performance rows)",
            n,
            self.feature_data.nrows(),
            self.performance_data.nrows()
        );
        ensure!(
            self.feature_data.ncols() == self.feature_names.len(),
            "feature matrix has {} columns but {} feature names",
            self.feature_data.ncols(),
            self.feature_names.len()
        );
        ensure!(
            self.performance_data.ncols() == self.algorithms.len(),
            "performance matrix has {} columns but {} algorithms",
            self.performance_data.ncols(),
            self.algorithms.len()
        );
        Ok(())
    }

    /// Whether `a` is strictly better than `b` under the scenario objective.
    pub fn better(&self, a: f64, b: f64) -> bool {
        if self.maximize {
            a > b
        } else {
            a < b
        }
    }

    pub fn subset(&self, rows: &[usize]) -> Scenario {
        Scenario {
            instances: rows.iter().map(|&r| self.instances[r].clone()).collect(),
            feature_data: self.feature_data.select(Axis(0), rows),
            performance_data: self.performance_data.select(Axis(0), rows),
            ..self.clone()
        }
    }

    /// Deterministic strided cross validation split for `fold` (1-based).
    ///
    /// The union of all test partitions over `1..=folds` is exactly the
    /// instance set, each instance appearing once.
    pub fn get_split(
        &self,
        fold: usize,
        folds: usize,
    ) -> Result<(Scenario, Scenario)> {
        ensure!(folds >= 2, "cross validation needs at least 2 folds");
        ensure!(
            (1..=folds).contains(&fold),
            "fold index {} out of range 1..={}",
            fold,
            folds
        );
        ensure!(
            folds <= self.instances.len(),
            "cannot split {} instances into {} folds",
            self.instances.len(),
            folds
        );
        let (test_rows, train_rows): (Vec<usize>, Vec<usize>) =
            (0..self.instances.len()).partition(|i| i % folds == fold - 1);
        Ok((self.subset(&test_rows), self.subset(&train_rows)))
    }

    /// Scenario with the data rows dropped, keeping only the metadata needed
    /// to rebuild an inference scenario. Used by the saved model bundle.
    pub fn metadata_only(&self) -> Scenario {
        Scenario {
            instances: vec![],
            feature_data: Array2::zeros((0, self.feature_names.len())),
            performance_data: Array2::zeros((0, self.algorithms.len())),
            ..self.clone()
        }
    }

    /// Scenario holding a single pseudo instance with the given raw feature
    /// vector, used to predict a schedule for one unseen instance.
    pub fn for_inference(&self, feature_vec: &[f64]) -> Result<Scenario> {
        ensure!(
            feature_vec.len() == self.feature_names.len(),
            "expected {} feature values, got {}",
            self.feature_names.len(),
            feature_vec.len()
        );
        Ok(Scenario {
            instances: vec![PSEUDO_INSTANCE.to_string()],
            feature_data: Array2::from_shape_vec(
                (1, feature_vec.len()),
                feature_vec.to_vec(),
            )?,
            performance_data: Array2::from_elem(
                (1, self.algorithms.len()),
                f64::NAN,
            ),
            ..self.clone()
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierKind {
    DecisionStump,
    Logistic,
}

impl FromStr for ClassifierKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "stump" | "decision_stump" => Ok(ClassifierKind::DecisionStump),
            "logistic" => Ok(ClassifierKind::Logistic),
            _ => anyhow::bail!("unknown classifier: {}", s),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImputeStrategy {
    Mean,
    Median,
}

impl FromStr for ImputeStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "mean" => Ok(ImputeStrategy::Mean),
            "median" => Ok(ImputeStrategy::Median),
            _ => anyhow::bail!("unknown impute strategy: {}", s),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct LogisticParams {
    pub learning_rate: f64,
    pub epochs: usize,
    pub l2: f64,
}

impl Default for LogisticParams {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            epochs: 200,
            l2: 1e-4,
        }
    }
}

/// Immutable parameter configuration for fitting. Overrides produce a new
/// value instead of mutating the one passed in.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    pub classifier: ClassifierKind,
    pub impute: ImputeStrategy,
    pub scale: bool,
    /// Enabled feature groups; `None` means the scenario defaults.
    pub fgroups: Option<Vec<String>>,
    pub logistic: LogisticParams,
    /// Fraction of the cutoff granted to a pre-solving schedule, forwarded
    /// to whatever `PreSolver` the caller supplies.
    pub presolver_budget: f64,
    pub seed: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            classifier: ClassifierKind::Logistic,
            impute: ImputeStrategy::Mean,
            scale: true,
            fgroups: None,
            logistic: LogisticParams::default(),
            presolver_budget: 0.25,
            seed: 12345,
        }
    }
}

impl Config {
    /// Returns a copy of the configuration with the given `key=value`
    /// settings applied. Unknown keys are skipped with a warning, values
    /// that fail to coerce to the typed field are an error.
    pub fn with_overrides(
        &self,
        overrides: &[(String, String)],
    ) -> Result<Config> {
        let mut config = self.clone();
        for (key, value) in overrides {
            let context = || format!("invalid value {:?} for {:?}", value, key);
            match key.as_str() {
                "classifier" => config.classifier = value.parse()?,
                "impute" => config.impute = value.parse()?,
                "scale" => config.scale = value.parse().with_context(context)?,
                "fgroups" => {
                    config.fgroups =
                        Some(value.split(',').map(str::to_string).collect())
                }
                "learning_rate" => {
                    config.logistic.learning_rate =
                        value.parse().with_context(context)?
                }
                "epochs" => {
                    config.logistic.epochs =
                        value.parse().with_context(context)?
                }
                "l2" => {
                    config.logistic.l2 = value.parse().with_context(context)?
                }
                "presolver_budget" => {
                    config.presolver_budget =
                        value.parse().with_context(context)?
                }
                "seed" => config.seed = value.parse().with_context(context)?,
                _ => warn!("unknown parameter: {} {}", key, value),
            }
        }
        Ok(config)
    }
}
