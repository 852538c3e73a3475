//! Dense layers and activation functions

use ndarray::{Array1, Array2, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::KolosalError;

/// Activation function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activation {
    /// Rectified Linear Unit
    ReLU,
    /// Sigmoid
    Sigmoid,
    /// Hyperbolic tangent
    Tanh,
    /// Linear (identity)
    Linear,
    /// Softmax (for output layer)
    Softmax,
}

impl Default for Activation {
    fn default() -> Self {
        Self::ReLU
    }
}

impl Activation {
    /// Apply the activation element-wise (row-wise for softmax)
    pub fn apply(&self, z: &Array2<f64>) -> Array2<f64> {
        match self {
            Activation::ReLU => z.mapv(|v| v.max(0.0)),
            Activation::Sigmoid => z.mapv(|v| 1.0 / (1.0 + (-v).exp())),
            Activation::Tanh => z.mapv(|v| v.tanh()),
            Activation::Linear => z.clone(),
            Activation::Softmax => {
                let mut result = z.clone();
                for mut row in result.rows_mut() {
                    let max = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                    let exp_sum: f64 = row.iter().map(|&v| (v - max).exp()).sum();
                    for v in row.iter_mut() {
                        *v = (*v - max).exp() / exp_sum;
                    }
                }
                result
            }
        }
    }

    /// Propagate `grad` (dL/da) back through the activation, giving dL/dz.
    ///
    /// `z` is the pre-activation and `a` the activation output of the same layer.
    pub fn backward(&self, z: &Array2<f64>, a: &Array2<f64>, grad: &Array2<f64>) -> Array2<f64> {
        match self {
            Activation::ReLU => grad * &z.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 }),
            Activation::Sigmoid => grad * &(a * &(1.0 - a)),
            Activation::Tanh => grad * &(1.0 - a * a),
            Activation::Linear => grad.clone(),
            Activation::Softmax => {
                // Row-wise Jacobian-vector product: s * (g - <g, s>)
                let dot = (grad * a).sum_axis(Axis(1)).insert_axis(Axis(1));
                a * &(grad - &dot)
            }
        }
    }

    /// Keras-style lowercase name
    pub fn name(&self) -> &'static str {
        match self {
            Activation::ReLU => "relu",
            Activation::Sigmoid => "sigmoid",
            Activation::Tanh => "tanh",
            Activation::Linear => "linear",
            Activation::Softmax => "softmax",
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Activation {
    type Err = KolosalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "relu" => Ok(Activation::ReLU),
            "sigmoid" => Ok(Activation::Sigmoid),
            "tanh" => Ok(Activation::Tanh),
            "linear" | "identity" => Ok(Activation::Linear),
            "softmax" => Ok(Activation::Softmax),
            other => Err(KolosalError::invalid_param(
                "activation",
                other,
                "expected one of relu, sigmoid, tanh, linear, softmax",
            )),
        }
    }
}

/// Fully connected layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dense {
    pub(crate) weights: Array2<f64>,
    pub(crate) bias: Array1<f64>,
    pub(crate) activation: Activation,
}

impl Dense {
    /// Create a layer with Xavier/Glorot uniform initialization
    pub fn new(n_in: usize, n_out: usize, activation: Activation, rng: &mut impl Rng) -> Self {
        let scale = (6.0 / (n_in + n_out) as f64).sqrt();
        let weights = Array2::from_shape_fn((n_in, n_out), |_| rng.gen::<f64>() * 2.0 * scale - scale);

        Self {
            weights,
            bias: Array1::zeros(n_out),
            activation,
        }
    }

    /// Forward pass returning (pre-activation, activation)
    pub fn forward(&self, x: &Array2<f64>) -> (Array2<f64>, Array2<f64>) {
        let z = x.dot(&self.weights) + &self.bias;
        let a = self.activation.apply(&z);
        (z, a)
    }

    pub fn input_dim(&self) -> usize {
        self.weights.nrows()
    }

    pub fn units(&self) -> usize {
        self.weights.ncols()
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    /// Number of trainable parameters
    pub fn num_params(&self) -> usize {
        self.weights.len() + self.bias.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    #[test]
    fn test_activation_functions() {
        let z = Array2::from_shape_vec((2, 3), vec![-1.0, 0.0, 1.0, -2.0, 0.5, 2.0]).unwrap();

        let relu = Activation::ReLU.apply(&z);
        assert_eq!(relu[[0, 0]], 0.0);
        assert_eq!(relu[[0, 2]], 1.0);

        let sigmoid = Activation::Sigmoid.apply(&z);
        assert!((sigmoid[[0, 1]] - 0.5).abs() < 0.001); // sigmoid(0) = 0.5
    }

    #[test]
    fn test_softmax_rows_sum_to_one() {
        let z = Array2::from_shape_vec((2, 3), vec![1.0, 2.0, 3.0, -5.0, 0.0, 5.0]).unwrap();
        let s = Activation::Softmax.apply(&z);
        for row in s.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_softmax_backward_matches_finite_difference() {
        let z = Array2::from_shape_vec((1, 3), vec![0.3, -0.2, 0.9]).unwrap();
        let g = Array2::from_shape_vec((1, 3), vec![1.0, -2.0, 0.5]).unwrap();
        let a = Activation::Softmax.apply(&z);
        let analytic = Activation::Softmax.backward(&z, &a, &g);

        let eps = 1e-6;
        for j in 0..3 {
            let mut zp = z.clone();
            zp[[0, j]] += eps;
            let mut zm = z.clone();
            zm[[0, j]] -= eps;
            let fp = (Activation::Softmax.apply(&zp) * &g).sum();
            let fm = (Activation::Softmax.apply(&zm) * &g).sum();
            let numeric = (fp - fm) / (2.0 * eps);
            assert!((analytic[[0, j]] - numeric).abs() < 1e-6);
        }
    }

    #[test]
    fn test_activation_from_str() {
        assert_eq!("ReLU".parse::<Activation>().unwrap(), Activation::ReLU);
        assert_eq!("tanh".parse::<Activation>().unwrap(), Activation::Tanh);
        assert!("swish".parse::<Activation>().is_err());
    }

    #[test]
    fn test_dense_shapes() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        let layer = Dense::new(4, 8, Activation::ReLU, &mut rng);
        let x = Array2::ones((5, 4));
        let (z, a) = layer.forward(&x);

        assert_eq!(z.dim(), (5, 8));
        assert_eq!(a.dim(), (5, 8));
        assert_eq!(layer.num_params(), 4 * 8 + 8);
    }
}
