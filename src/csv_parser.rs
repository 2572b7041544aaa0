use std::collections::HashMap;
use std::path::Path;

use itertools::{izip, Itertools};
use ndarray::Array2;
use polars::prelude::*;

use anyhow::{bail, ensure, Context, Result};

use crate::datastructures::*;


/// Reads a scenario from a long-format performance csv with the header
/// `instance,algorithm,performance` and a wide feature csv with the header
/// `instance,<feature columns>`.
///
/// Every (instance, algorithm) pair must appear exactly once in the
/// performance csv. Feature values may be empty; they stay NaN until
/// imputation. Instance and algorithm order follows first appearance in the
/// performance csv.
pub fn read_scenario(
    perf_path: &Path,
    feat_path: &Path,
    performance_type: PerformanceType,
    algorithm_cutoff_time: Option<f64>,
    maximize: bool,
) -> Result<Scenario> {
    if performance_type == PerformanceType::Runtime {
        ensure!(
            algorithm_cutoff_time.map_or(false, |c| c > 0.0),
            "the runtime objective requires a positive cutoff time"
        );
    }
    let perf_df = read_csv(perf_path)?;
    let instance_col = perf_df
        .column("instance")
        .context("performance csv needs an `instance` column")?
        .utf8()?;
    let algorithm_col = perf_df
        .column("algorithm")
        .context("performance csv needs an `algorithm` column")?
        .utf8()?;
    let value_col = perf_df
        .column("performance")
        .context("performance csv needs a `performance` column")?
        .cast(&DataType::Float64)?;

    let instances = instance_col
        .into_no_null_iter()
        .unique()
        .map(str::to_string)
        .collect_vec();
    let algorithms = algorithm_col
        .into_no_null_iter()
        .unique()
        .map(str::to_string)
        .collect_vec();
    let instance_rows: HashMap<&str, usize> = instances
        .iter()
        .enumerate()
        .map(|(row, name)| (name.as_str(), row))
        .collect();
    let algorithm_cols: HashMap<&str, usize> = algorithms
        .iter()
        .enumerate()
        .map(|(col, name)| (name.as_str(), col))
        .collect();

    let mut performance_data = Array2::from_elem(
        (instances.len(), algorithms.len()),
        f64::NAN,
    );
    for (instance, algorithm, value) in izip!(
        instance_col.into_no_null_iter(),
        algorithm_col.into_no_null_iter(),
        value_col.f64()?.into_iter()
    ) {
        let value = value.with_context(|| {
            format!("missing performance value for ({instance}, {algorithm})")
        })?;
        let cell = &mut performance_data
            [[instance_rows[instance], algorithm_cols[algorithm]]];
        ensure!(
            cell.is_nan(),
            "duplicate performance entry for ({}, {})",
            instance,
            algorithm
        );
        *cell = value;
    }
    if let Some(((row, col), _)) = performance_data
        .indexed_iter()
        .find(|(_, value)| value.is_nan())
    {
        bail!(
            "no performance entry for ({}, {})",
            instances[row],
            algorithms[col]
        );
    }

    let (feature_names, feature_data) =
        read_features(feat_path, &instances)?;

    let scenario = Scenario {
        instances,
        algorithms,
        feature_steps: vec![FeatureStep {
            name: "all_features".to_string(),
            features: feature_names.clone(),
            default: true,
        }],
        feature_names,
        feature_data,
        performance_data,
        performance_type,
        algorithm_cutoff_time,
        maximize,
    };
    scenario.check()?;
    Ok(scenario)
}

fn read_csv(path: &Path) -> Result<DataFrame> {
    CsvReader::from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?
        .with_comment_char(Some(b'#'))
        .has_header(true)
        .finish()
        .with_context(|| format!("failed to parse {}", path.display()))
}

fn read_features(
    feat_path: &Path,
    instances: &[Instance],
) -> Result<(Vec<String>, Array2<f64>)> {
    let feat_df = read_csv(feat_path)?;
    let feature_names = feat_df
        .get_column_names()
        .iter()
        .filter(|name| **name != "instance")
        .map(|name| name.to_string())
        .collect_vec();
    ensure!(!feature_names.is_empty(), "feature csv has no feature columns");

    let csv_rows: HashMap<String, usize> = feat_df
        .column("instance")
        .context("feature csv needs an `instance` column")?
        .utf8()?
        .into_no_null_iter()
        .enumerate()
        .map(|(row, name)| (name.to_string(), row))
        .collect();
    let mut feature_data =
        Array2::from_elem((instances.len(), feature_names.len()), f64::NAN);
    for (col, name) in feature_names.iter().enumerate() {
        let values = feat_df.column(name)?.cast(&DataType::Float64)?;
        let values = values.f64()?;
        for (row, instance) in instances.iter().enumerate() {
            let csv_row = *csv_rows.get(instance).with_context(|| {
                format!("no feature row for instance {instance}")
            })?;
            if let Some(value) = values.get(csv_row) {
                feature_data[[row, col]] = value;
            }
        }
    }
    Ok((feature_names, feature_data))
}
