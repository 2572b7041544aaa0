use anyhow::{ensure, Result};
use itertools::Itertools;
use log::debug;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::datastructures::*;

/// Smallest standard deviation the scaler divides by.
const MIN_STD: f64 = 1e-12;

/// A fit/transform stage of the feature preprocessing pipeline.
///
/// `fit_transform` learns the stage parameters from a training scenario and
/// returns the transformed scenario; `transform` replays the fitted stage on
/// new data without updating any parameters. Stages are idempotent on data
/// already in their postcondition.
pub trait FeatureStage {
    fn fit_transform(
        &mut self,
        scenario: &Scenario,
        config: &Config,
    ) -> Result<Scenario>;
    fn transform(&self, scenario: &Scenario) -> Result<Scenario>;
}

/// Keeps only the feature columns belonging to enabled feature groups.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct GroupFilter {
    keep: Vec<usize>,
}

impl FeatureStage for GroupFilter {
    fn fit_transform(
        &mut self,
        scenario: &Scenario,
        config: &Config,
    ) -> Result<Scenario> {
        let enabled = |step: &FeatureStep| match &config.fgroups {
            Some(groups) => groups.contains(&step.name),
            None => step.default,
        };
        if let Some(groups) = &config.fgroups {
            for group in groups {
                ensure!(
                    scenario.feature_steps.iter().any(|s| &s.name == group),
                    "unknown feature group: {}",
                    group
                );
            }
        }
        let kept_names = scenario
            .feature_steps
            .iter()
            .filter(|step| enabled(step))
            .flat_map(|step| step.features.iter())
            .unique()
            .collect_vec();
        self.keep = scenario
            .feature_names
            .iter()
            .positions(|name| kept_names.contains(&name))
            .collect_vec();
        ensure!(!self.keep.is_empty(), "feature group filtering kept no features");
        debug!(
            "keeping {}/{} features",
            self.keep.len(),
            scenario.feature_names.len()
        );
        self.transform(scenario)
    }

    fn transform(&self, scenario: &Scenario) -> Result<Scenario> {
        // already filtered (e.g. an inference replay on filtered data)
        if self.keep.len() == scenario.feature_names.len()
            && self.keep.iter().enumerate().all(|(i, &c)| i == c)
        {
            return Ok(scenario.clone());
        }
        ensure!(
            self.keep.iter().all(|&c| c < scenario.feature_names.len()),
            "scenario has fewer feature columns than the fitted filter"
        );
        Ok(Scenario {
            feature_names: self
                .keep
                .iter()
                .map(|&c| scenario.feature_names[c].clone())
                .collect(),
            feature_data: scenario.feature_data.select(Axis(1), &self.keep),
            ..scenario.clone()
        })
    }
}

/// Replaces NaN feature values with per-column statistics of the training
/// data.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Imputer {
    fill: Vec<f64>,
}

impl Imputer {
    fn column_fill(column: &Array1<f64>, strategy: ImputeStrategy) -> f64 {
        let mut present =
            column.iter().copied().filter(|v| !v.is_nan()).collect_vec();
        if present.is_empty() {
            return 0.0;
        }
        match strategy {
            ImputeStrategy::Mean => {
                present.iter().sum::<f64>() / present.len() as f64
            }
            ImputeStrategy::Median => {
                present.sort_by(|a, b| a.total_cmp(b));
                let mid = present.len() / 2;
                if present.len() % 2 == 0 {
                    (present[mid - 1] + present[mid]) / 2.0
                } else {
                    present[mid]
                }
            }
        }
    }
}

impl FeatureStage for Imputer {
    fn fit_transform(
        &mut self,
        scenario: &Scenario,
        config: &Config,
    ) -> Result<Scenario> {
        self.fill = scenario
            .feature_data
            .columns()
            .into_iter()
            .map(|column| {
                Self::column_fill(&column.to_owned(), config.impute)
            })
            .collect_vec();
        self.transform(scenario)
    }

    fn transform(&self, scenario: &Scenario) -> Result<Scenario> {
        ensure!(
            self.fill.len() == scenario.feature_data.ncols(),
            "scenario feature count does not match the fitted imputer"
        );
        let mut feature_data = scenario.feature_data.clone();
        for (mut column, &fill) in
            feature_data.columns_mut().into_iter().zip(&self.fill)
        {
            column.mapv_inplace(|v| if v.is_nan() { fill } else { v });
        }
        Ok(Scenario {
            feature_data,
            ..scenario.clone()
        })
    }
}

/// Per-column mean/std standardization. Skipped entirely when disabled, but
/// the stage still occupies its pipeline slot so serialized pipelines replay
/// positionally.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Scaler {
    enabled: bool,
    mean: Vec<f64>,
    std: Vec<f64>,
}

impl FeatureStage for Scaler {
    fn fit_transform(
        &mut self,
        scenario: &Scenario,
        config: &Config,
    ) -> Result<Scenario> {
        self.enabled = config.scale;
        if !self.enabled {
            return Ok(scenario.clone());
        }
        let n = scenario.feature_data.nrows().max(1) as f64;
        self.mean = scenario
            .feature_data
            .sum_axis(Axis(0))
            .mapv(|s| s / n)
            .to_vec();
        self.std = scenario
            .feature_data
            .columns()
            .into_iter()
            .zip(&self.mean)
            .map(|(column, mean)| {
                let var = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
                    / n;
                var.sqrt().max(MIN_STD)
            })
            .collect_vec();
        self.transform(scenario)
    }

    fn transform(&self, scenario: &Scenario) -> Result<Scenario> {
        if !self.enabled {
            return Ok(scenario.clone());
        }
        ensure!(
            self.mean.len() == scenario.feature_data.ncols(),
            "scenario feature count does not match the fitted scaler"
        );
        let mut feature_data = scenario.feature_data.clone();
        for ((mut column, &mean), &std) in feature_data
            .columns_mut()
            .into_iter()
            .zip(&self.mean)
            .zip(&self.std)
        {
            column.mapv_inplace(|v| (v - mean) / std);
        }
        Ok(Scenario {
            feature_data,
            ..scenario.clone()
        })
    }
}

/// Serializable pipeline slot, dispatching to the concrete stages.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum PipelineStage {
    Filter(GroupFilter),
    Impute(Imputer),
    Scale(Scaler),
}

impl FeatureStage for PipelineStage {
    fn fit_transform(
        &mut self,
        scenario: &Scenario,
        config: &Config,
    ) -> Result<Scenario> {
        match self {
            PipelineStage::Filter(stage) => stage.fit_transform(scenario, config),
            PipelineStage::Impute(stage) => stage.fit_transform(scenario, config),
            PipelineStage::Scale(stage) => stage.fit_transform(scenario, config),
        }
    }

    fn transform(&self, scenario: &Scenario) -> Result<Scenario> {
        match self {
            PipelineStage::Filter(stage) => stage.transform(scenario),
            PipelineStage::Impute(stage) => stage.transform(scenario),
            PipelineStage::Scale(stage) => stage.transform(scenario),
        }
    }
}

/// Fits the fixed-order pipeline (filter, impute, scale). Later stages
/// assume earlier stages' postconditions, so the order is not configurable.
pub fn fit_pipeline(
    scenario: &Scenario,
    config: &Config,
) -> Result<(Vec<PipelineStage>, Scenario)> {
    let mut pipeline = vec![
        PipelineStage::Filter(GroupFilter::default()),
        PipelineStage::Impute(Imputer::default()),
        PipelineStage::Scale(Scaler::default()),
    ];
    let mut scenario = scenario.clone();
    for stage in &mut pipeline {
        scenario = stage.fit_transform(&scenario, config)?;
    }
    Ok((pipeline, scenario))
}
