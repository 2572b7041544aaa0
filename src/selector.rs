use anyhow::{ensure, Result};
use log::{debug, info};
use ndarray::{Array1, Array2, ArrayView1};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::classifiers::BinaryClassifier;
use crate::datastructures::*;


/// Budget used when the scenario defines no cutoff time.
pub const UNBOUNDED_BUDGET: f64 = (1u64 << 31) as f64;

/// Canonical enumeration of unordered algorithm pairs: outer index
/// ascending, inner index ascending. Fit and predict both walk this order.
pub fn algorithm_pairs(
    n_algorithms: usize,
) -> impl Iterator<Item = (usize, usize)> {
    (0..n_algorithms)
        .flat_map(move |i| (i + 1..n_algorithms).map(move |j| (i, j)))
}

/// One fitted binary classifier together with the algorithm pair it
/// compares, keyed explicitly instead of by enumeration position.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PairModel<C> {
    pub pair: (usize, usize),
    clf: C,
}

/// Pairwise tournament selector.
///
/// Reduces the ranking problem over `A` algorithms to `A*(A-1)/2` binary
/// "is i better than j" classifiers. At prediction time the pairwise
/// outcomes vote and the algorithm with the most votes is scheduled with the
/// full remaining budget. Training pairs are weighted by the performance gap
/// so the classifiers concentrate on the consequential comparisons.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PairwiseClassifier<C> {
    algorithms: Vec<Algorithm>,
    models: Vec<PairModel<C>>,
}

impl<C: BinaryClassifier> PairwiseClassifier<C> {
    pub fn fit(
        scenario: &Scenario,
        config: &Config,
        rng: &mut ChaCha8Rng,
    ) -> Result<Self> {
        let n_algorithms = scenario.algorithms.len();
        ensure!(
            n_algorithms >= 2,
            "pairwise selection needs at least 2 algorithms, got {}",
            n_algorithms
        );
        info!(
            "fitting {} pairwise classifiers over {} instances",
            n_algorithms * (n_algorithms - 1) / 2,
            scenario.instances.len()
        );
        let x = &scenario.feature_data;
        let mut models = Vec::with_capacity(n_algorithms * (n_algorithms - 1) / 2);
        for (i, j) in algorithm_pairs(n_algorithms) {
            let perf_i = scenario.performance_data.column(i);
            let perf_j = scenario.performance_data.column(j);
            let y: Array1<bool> = perf_i
                .iter()
                .zip(&perf_j)
                .map(|(&a, &b)| scenario.better(a, b))
                .collect();
            let weights: Array1<f64> = perf_i
                .iter()
                .zip(&perf_j)
                .map(|(&a, &b)| (a - b).abs())
                .collect();
            let clf = C::fit(x, &y, &weights, config, rng)?;
            models.push(PairModel { pair: (i, j), clf });
        }
        Ok(Self {
            algorithms: scenario.algorithms.clone(),
            models,
        })
    }

    /// Number of fitted pairwise classifiers.
    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Predicts a single-entry schedule per instance: the tournament winner
    /// with the cutoff plus one time unit ("run to completion, the cutoff is
    /// advisory"), or an effectively unbounded budget without a cutoff.
    pub fn predict(&self, scenario: &Scenario) -> Result<Schedules> {
        ensure!(
            scenario.algorithms == self.algorithms,
            "scenario algorithms {:?} do not match the fitted algorithms {:?}",
            scenario.algorithms,
            self.algorithms
        );
        let budget = scenario
            .algorithm_cutoff_time
            .map_or(UNBOUNDED_BUDGET, |cutoff| cutoff + 1.0);
        let mut scores = Array2::<u32>::zeros((
            scenario.instances.len(),
            self.algorithms.len(),
        ));
        for PairModel { pair: (i, j), clf } in &self.models {
            let outcomes = clf.predict(&scenario.feature_data);
            for (row, favors_i) in outcomes.iter().enumerate() {
                let winner = if *favors_i { *i } else { *j };
                scores[[row, winner]] += 1;
            }
        }
        debug!("vote matrix: {:?}", scores);
        Ok(scenario
            .instances
            .iter()
            .enumerate()
            .map(|(row, instance)| {
                let winner = stable_argmax(scores.row(row));
                (
                    instance.clone(),
                    vec![(self.algorithms[winner].clone(), budget)],
                )
            })
            .collect())
    }
}

/// Index of the maximum vote count; ties resolve to the lowest index.
fn stable_argmax(votes: ArrayView1<u32>) -> usize {
    let mut winner = 0;
    for (index, &count) in votes.iter().enumerate() {
        if count > votes[winner] {
            winner = index;
        }
    }
    winner
}
