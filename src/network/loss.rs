//! Loss functions and metrics

use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

const EPSILON: f64 = 1e-7;

/// Training loss
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Loss {
    /// Cross-entropy over one-hot targets
    CategoricalCrossentropy,
    /// Mean squared error
    MeanSquaredError,
}

impl Loss {
    /// Mean loss over the batch
    pub fn compute(&self, y_true: &Array2<f64>, y_pred: &Array2<f64>) -> f64 {
        let n = y_true.nrows().max(1) as f64;
        match self {
            Loss::CategoricalCrossentropy => {
                let total: f64 = y_true
                    .iter()
                    .zip(y_pred.iter())
                    .map(|(&t, &p)| -t * p.clamp(EPSILON, 1.0 - EPSILON).ln())
                    .sum();
                total / n
            }
            Loss::MeanSquaredError => {
                let k = y_true.ncols().max(1) as f64;
                let total: f64 = y_true
                    .iter()
                    .zip(y_pred.iter())
                    .map(|(&t, &p)| (t - p).powi(2))
                    .sum();
                total / (n * k)
            }
        }
    }

    /// Gradient of the mean loss with respect to the predictions
    pub fn gradient(&self, y_true: &Array2<f64>, y_pred: &Array2<f64>) -> Array2<f64> {
        let n = y_true.nrows().max(1) as f64;
        match self {
            Loss::CategoricalCrossentropy => {
                let mut grad = Array2::zeros(y_pred.raw_dim());
                ndarray::Zip::from(&mut grad)
                    .and(y_true)
                    .and(y_pred)
                    .for_each(|g, &t, &p| {
                        let p = p.clamp(EPSILON, 1.0 - EPSILON);
                        *g = -t / (p * n);
                    });
                grad
            }
            Loss::MeanSquaredError => {
                let k = y_true.ncols().max(1) as f64;
                (y_pred - y_true) * (2.0 / (n * k))
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Loss::CategoricalCrossentropy => "categorical_crossentropy",
            Loss::MeanSquaredError => "mse",
        }
    }
}

fn argmax(row: ArrayView1<f64>) -> usize {
    row.iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(best_i, best_v), (i, &v)| {
            if v > best_v { (i, v) } else { (best_i, best_v) }
        })
        .0
}

/// Fraction of rows whose predicted class matches the one-hot target
pub fn categorical_accuracy(y_true: &Array2<f64>, y_pred: &Array2<f64>) -> f64 {
    if y_true.nrows() == 0 {
        return 0.0;
    }

    let correct = y_true
        .rows()
        .into_iter()
        .zip(y_pred.rows())
        .filter(|(t, p)| argmax(t.view()) == argmax(p.view()))
        .count();

    correct as f64 / y_true.nrows() as f64
}
