//! Adam optimizer (with optional AMSGrad)

use ndarray::{Array, Array1, Array2, Dimension, Zip};
use serde::{Deserialize, Serialize};

/// Adam hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdamConfig {
    pub learning_rate: f64,
    pub beta_1: f64,
    pub beta_2: f64,
    pub epsilon: f64,
    /// Use the running maximum of the second moment
    pub amsgrad: bool,
}

impl Default for AdamConfig {
    fn default() -> Self {
        Self {
            learning_rate: 1e-3,
            beta_1: 0.9,
            beta_2: 0.999,
            epsilon: 1e-7,
            amsgrad: false,
        }
    }
}

#[derive(Debug, Clone)]
struct Moments<D: Dimension> {
    m: Array<f64, D>,
    v: Array<f64, D>,
    v_max: Option<Array<f64, D>>,
}

impl<D: Dimension> Moments<D> {
    fn zeros_like(param: &Array<f64, D>, amsgrad: bool) -> Self {
        Self {
            m: Array::zeros(param.raw_dim()),
            v: Array::zeros(param.raw_dim()),
            v_max: amsgrad.then(|| Array::zeros(param.raw_dim())),
        }
    }
}

/// Adam optimizer state for one model
#[derive(Debug, Clone)]
pub struct Adam {
    config: AdamConfig,
    iterations: u64,
    weight_moments: Vec<Moments<ndarray::Ix2>>,
    bias_moments: Vec<Moments<ndarray::Ix1>>,
}

impl Adam {
    pub fn new(config: AdamConfig) -> Self {
        Self {
            config,
            iterations: 0,
            weight_moments: Vec::new(),
            bias_moments: Vec::new(),
        }
    }

    /// Adam with the given learning rate and AMSGrad switch
    pub fn with_learning_rate(learning_rate: f64, amsgrad: bool) -> Self {
        Self::new(AdamConfig {
            learning_rate,
            amsgrad,
            ..Default::default()
        })
    }

    pub fn config(&self) -> &AdamConfig {
        &self.config
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Apply one update step to every layer's parameters
    pub fn step(
        &mut self,
        weights: &mut [&mut Array2<f64>],
        biases: &mut [&mut Array1<f64>],
        grads: &[(Array2<f64>, Array1<f64>)],
    ) {
        if self.weight_moments.len() != weights.len() {
            self.weight_moments = weights
                .iter()
                .map(|w| Moments::zeros_like(&**w, self.config.amsgrad))
                .collect();
            self.bias_moments = biases
                .iter()
                .map(|b| Moments::zeros_like(&**b, self.config.amsgrad))
                .collect();
        }

        self.iterations += 1;
        let t = self.iterations as i32;
        let lr_t = self.config.learning_rate * (1.0 - self.config.beta_2.powi(t)).sqrt()
            / (1.0 - self.config.beta_1.powi(t));

        for (i, (grad_w, grad_b)) in grads.iter().enumerate() {
            update(&mut *weights[i], grad_w, &mut self.weight_moments[i], lr_t, &self.config);
            update(&mut *biases[i], grad_b, &mut self.bias_moments[i], lr_t, &self.config);
        }
    }
}

fn update<D: Dimension>(
    param: &mut Array<f64, D>,
    grad: &Array<f64, D>,
    state: &mut Moments<D>,
    lr_t: f64,
    config: &AdamConfig,
) {
    let (b1, b2, eps) = (config.beta_1, config.beta_2, config.epsilon);

    Zip::from(&mut state.m).and(grad).for_each(|m, &g| *m = b1 * *m + (1.0 - b1) * g);
    Zip::from(&mut state.v).and(grad).for_each(|v, &g| *v = b2 * *v + (1.0 - b2) * g * g);

    let second = match state.v_max.as_mut() {
        Some(v_max) => {
            Zip::from(&mut *v_max).and(&state.v).for_each(|vm, &v| *vm = vm.max(v));
            &*v_max
        }
        None => &state.v,
    };

    Zip::from(param)
        .and(&state.m)
        .and(second)
        .for_each(|p, &m, &v| *p -= lr_t * m / (v.sqrt() + eps));
}
