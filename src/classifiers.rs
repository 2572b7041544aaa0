use anyhow::{ensure, Result};
use itertools::Itertools;
use ndarray::{Array1, Array2};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::datastructures::{ClassifierKind, Config};

/// Supervised binary classifier contract used by the pairwise selector.
///
/// A fresh instance is constructed and fit per training problem; `predict`
/// returns one label per row of `x`. Stochastic implementations draw from the
/// supplied rng so repeated runs with the same seed are reproducible.
pub trait BinaryClassifier: Sized {
    fn fit(
        x: &Array2<f64>,
        y: &Array1<bool>,
        weights: &Array1<f64>,
        config: &Config,
        rng: &mut ChaCha8Rng,
    ) -> Result<Self>;

    fn predict(&self, x: &Array2<f64>) -> Array1<bool>;
}

/// Weighted one-feature threshold rule.
///
/// Scans every feature and every midpoint between adjacent distinct values
/// for the split minimizing the weighted training error; falls back to a
/// constant prediction when no split improves on it. All tie breaks are
/// deterministic (first feature, lowest threshold).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DecisionStump {
    feature: usize,
    threshold: f64,
    predict_le: bool,
    predict_gt: bool,
}

impl BinaryClassifier for DecisionStump {
    fn fit(
        x: &Array2<f64>,
        y: &Array1<bool>,
        weights: &Array1<f64>,
        _config: &Config,
        _rng: &mut ChaCha8Rng,
    ) -> Result<Self> {
        ensure!(
            x.nrows() == y.len() && y.len() == weights.len(),
            "label and weight vectors must be row-aligned with the features"
        );
        let w_true: f64 = y
            .iter()
            .zip(weights)
            .filter(|(label, _)| **label)
            .map(|(_, w)| w)
            .sum();
        let w_false = weights.sum() - w_true;
        // constant prediction baseline, ties default to false
        let constant = w_false < w_true;
        let mut best_error = if constant { w_false } else { w_true };
        let mut best = DecisionStump {
            feature: 0,
            threshold: f64::NEG_INFINITY,
            predict_le: constant,
            predict_gt: constant,
        };
        for feature in 0..x.ncols() {
            let order = (0..x.nrows())
                .sorted_by(|&a, &b| {
                    x[[a, feature]].total_cmp(&x[[b, feature]])
                })
                .collect_vec();
            let mut true_left = 0.0;
            let mut false_left = 0.0;
            for (pos, &row) in order.iter().enumerate() {
                if y[row] {
                    true_left += weights[row];
                } else {
                    false_left += weights[row];
                }
                if pos + 1 == order.len() {
                    break;
                }
                let here = x[[row, feature]];
                let next = x[[order[pos + 1], feature]];
                if here == next {
                    continue;
                }
                let threshold = (here + next) / 2.0;
                for (error, predict_le) in [
                    (false_left + (w_true - true_left), true),
                    (true_left + (w_false - false_left), false),
                ] {
                    if error < best_error {
                        best_error = error;
                        best = DecisionStump {
                            feature,
                            threshold,
                            predict_le,
                            predict_gt: !predict_le,
                        };
                    }
                }
            }
        }
        Ok(best)
    }

    fn predict(&self, x: &Array2<f64>) -> Array1<bool> {
        x.rows()
            .into_iter()
            .map(|row| {
                if row[self.feature] <= self.threshold {
                    self.predict_le
                } else {
                    self.predict_gt
                }
            })
            .collect()
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Weighted logistic regression trained by full-batch gradient descent with
/// L2 regularization. Initial weights are drawn from the supplied rng.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Logistic {
    weights: Array1<f64>,
    bias: f64,
}

impl BinaryClassifier for Logistic {
    fn fit(
        x: &Array2<f64>,
        y: &Array1<bool>,
        weights: &Array1<f64>,
        config: &Config,
        rng: &mut ChaCha8Rng,
    ) -> Result<Self> {
        ensure!(
            x.nrows() == y.len() && y.len() == weights.len(),
            "label and weight vectors must be row-aligned with the features"
        );
        let total_weight = weights.sum();
        if total_weight <= 0.0 {
            // all comparisons are exact ties, nothing to learn
            return Ok(Logistic {
                weights: Array1::zeros(x.ncols()),
                bias: 0.0,
            });
        }
        let params = &config.logistic;
        let mut w = Array1::from_shape_fn(x.ncols(), |_| {
            rng.gen_range(-0.01..0.01)
        });
        let mut bias = 0.0;
        let targets = y.mapv(|label| label as u8 as f64);
        let sample_weights = weights / total_weight;
        for _ in 0..params.epochs {
            let p = (x.dot(&w) + bias).mapv(sigmoid);
            let residual = (&p - &targets) * &sample_weights;
            let grad_w = x.t().dot(&residual) + params.l2 * &w;
            let grad_b = residual.sum();
            w.scaled_add(-params.learning_rate, &grad_w);
            bias -= params.learning_rate * grad_b;
        }
        Ok(Logistic { weights: w, bias })
    }

    fn predict(&self, x: &Array2<f64>) -> Array1<bool> {
        (x.dot(&self.weights) + self.bias).mapv(|z| sigmoid(z) > 0.5)
    }
}

/// Dispatch over the built-in classifier implementations, selected by the
/// configuration.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum Classifier {
    Stump(DecisionStump),
    Logistic(Logistic),
}

impl BinaryClassifier for Classifier {
    fn fit(
        x: &Array2<f64>,
        y: &Array1<bool>,
        weights: &Array1<f64>,
        config: &Config,
        rng: &mut ChaCha8Rng,
    ) -> Result<Self> {
        match config.classifier {
            ClassifierKind::DecisionStump => Ok(Classifier::Stump(
                DecisionStump::fit(x, y, weights, config, rng)?,
            )),
            ClassifierKind::Logistic => Ok(Classifier::Logistic(
                Logistic::fit(x, y, weights, config, rng)?,
            )),
        }
    }

    fn predict(&self, x: &Array2<f64>) -> Array1<bool> {
        match self {
            Classifier::Stump(clf) => clf.predict(x),
            Classifier::Logistic(clf) => clf.predict(x),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use ndarray::{arr1, arr2};
    use rand::SeedableRng;

    fn separable() -> (Array2<f64>, Array1<bool>, Array1<f64>) {
        let x = arr2(&[
            [0.0, 1.0],
            [0.2, 0.9],
            [0.1, 1.1],
            [1.0, 0.1],
            [0.9, 0.0],
            [1.1, 0.2],
        ]);
        let y = arr1(&[true, true, true, false, false, false]);
        let w = arr1(&[1.0; 6]);
        (x, y, w)
    }

    #[test]
    fn test_stump_learns_separable_labels() {
        let (x, y, w) = separable();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let stump =
            DecisionStump::fit(&x, &y, &w, &default_config(), &mut rng)
                .unwrap();
        assert_eq!(stump.predict(&x), y);
    }

    #[test]
    fn test_stump_respects_weights() {
        // identical features with conflicting labels, the heavy row wins
        let x = arr2(&[[0.0], [0.0], [1.0]]);
        let y = arr1(&[true, false, false]);
        let w = arr1(&[10.0, 1.0, 1.0]);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let stump = DecisionStump::fit(&x, &y, &w, &default_config(), &mut rng)
            .unwrap();
        assert_eq!(stump.predict(&x), arr1(&[true, true, false]));
    }

    #[test]
    fn test_stump_zero_weights_predict_false() {
        let x = arr2(&[[0.0], [1.0]]);
        let y = arr1(&[false, false]);
        let w = arr1(&[0.0, 0.0]);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let stump = DecisionStump::fit(&x, &y, &w, &default_config(), &mut rng)
            .unwrap();
        assert_eq!(stump.predict(&x), arr1(&[false, false]));
    }

    #[test]
    fn test_logistic_learns_separable_labels() {
        let (x, y, w) = separable();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let clf = Logistic::fit(&x, &y, &w, &default_config(), &mut rng)
            .unwrap();
        assert_eq!(clf.predict(&x), y);
    }

    #[test]
    fn test_classifier_dispatch_follows_config() {
        let (x, y, w) = separable();
        let config = default_config()
            .with_overrides(&[("classifier".to_string(), "stump".to_string())])
            .unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let clf = Classifier::fit(&x, &y, &w, &config, &mut rng).unwrap();
        assert!(matches!(clf, Classifier::Stump(_)));
    }
}
