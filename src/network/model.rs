//! Sequential feed-forward model
//!
//! A stack of [`Dense`] layers with a Keras-like lifecycle: build, `compile`,
//! `fit` (or `fit_generator`), checkpoint, `load_weights`, `evaluate`.

use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

use super::callbacks::{Callback, EpochLogs, History};
use super::layers::{Activation, Dense};
use super::loss::{categorical_accuracy, Loss};
use super::optimizer::Adam;
use crate::data::BatchGenerator;
use crate::error::{KolosalError, Result};

/// Options for [`Sequential::fit`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitOptions {
    pub epochs: usize,
    pub batch_size: usize,
    /// Shuffle training samples (or batch order for generators) every epoch
    pub shuffle: bool,
    /// Log a line per epoch
    pub verbose: bool,
    /// Loader threads used by `fit_generator`
    pub workers: usize,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            epochs: 1,
            batch_size: 32,
            shuffle: true,
            verbose: false,
            workers: 1,
        }
    }
}

impl FitOptions {
    pub fn new(epochs: usize, batch_size: usize) -> Self {
        Self {
            epochs,
            batch_size,
            ..Default::default()
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }
}

/// Loss and accuracy over a dataset
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub loss: f64,
    pub accuracy: f64,
}

#[derive(Debug, Clone)]
struct Compiled {
    optimizer: Adam,
    loss: Loss,
}

#[derive(Debug, Serialize, Deserialize)]
struct LayerWeights {
    weights: Array2<f64>,
    bias: Array1<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WeightsFile {
    layers: Vec<LayerWeights>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ModelFile {
    input_dim: usize,
    layers: Vec<Dense>,
}

/// Running loss/accuracy totals weighted by sample count
#[derive(Default)]
struct Accumulator {
    loss: f64,
    correct: f64,
    samples: usize,
}

impl Accumulator {
    fn add(&mut self, loss: f64, accuracy: f64, n: usize) {
        self.loss += loss * n as f64;
        self.correct += accuracy * n as f64;
        self.samples += n;
    }

    /// Averages over every sample seen; an empty pass has no meaningful score
    fn finish(&self, source: &str) -> Result<Evaluation> {
        if self.samples == 0 {
            return Err(KolosalError::DataError(format!("no {} samples", source)));
        }
        let n = self.samples as f64;
        Ok(Evaluation {
            loss: self.loss / n,
            accuracy: self.correct / n,
        })
    }
}

/// Feed-forward network of dense layers
#[derive(Debug, Clone)]
pub struct Sequential {
    input_dim: usize,
    layers: Vec<Dense>,
    rng: Xoshiro256PlusPlus,
    compiled: Option<Compiled>,
}

impl Sequential {
    /// Create an empty model taking `input_dim` features
    pub fn new(input_dim: usize) -> Self {
        Self {
            input_dim,
            layers: Vec::new(),
            rng: Xoshiro256PlusPlus::from_entropy(),
            compiled: None,
        }
    }

    /// Reseed the generator used for weight initialization and shuffling.
    ///
    /// Layers already added are initialized again from the new seed, so the
    /// same seed always yields the same starting weights.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        for layer in self.layers.iter_mut() {
            *layer = Dense::new(layer.input_dim(), layer.units(), layer.activation(), &mut self.rng);
        }
        self
    }

    /// Append a dense layer
    pub fn add(mut self, units: usize, activation: Activation) -> Self {
        let n_in = self.output_dim();
        let layer = Dense::new(n_in, units, activation, &mut self.rng);
        self.layers.push(layer);
        self
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    /// Width of the last layer (the input width for an empty model)
    pub fn output_dim(&self) -> usize {
        self.layers.last().map(|l| l.units()).unwrap_or(self.input_dim)
    }

    pub fn layers(&self) -> &[Dense] {
        &self.layers
    }

    pub fn num_params(&self) -> usize {
        self.layers.iter().map(|l| l.num_params()).sum()
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled.is_some()
    }

    /// Attach optimizer and loss; resets any previous optimizer state
    pub fn compile(&mut self, optimizer: Adam, loss: Loss) -> Result<()> {
        if self.layers.is_empty() {
            return Err(KolosalError::ConfigError(
                "cannot compile a model without layers".to_string(),
            ));
        }
        self.compiled = Some(Compiled { optimizer, loss });
        Ok(())
    }

    fn loss(&self) -> Result<Loss> {
        self.compiled
            .as_ref()
            .map(|c| c.loss)
            .ok_or(KolosalError::ModelNotCompiled)
    }

    fn check_inputs(&self, x: &Array2<f64>, y: Option<&Array2<f64>>) -> Result<()> {
        if x.ncols() != self.input_dim {
            return Err(KolosalError::shape(
                format!("{} input features", self.input_dim),
                format!("{} input features", x.ncols()),
            ));
        }
        if let Some(y) = y {
            if y.nrows() != x.nrows() {
                return Err(KolosalError::shape(
                    format!("{} target rows", x.nrows()),
                    format!("{} target rows", y.nrows()),
                ));
            }
            if y.ncols() != self.output_dim() {
                return Err(KolosalError::shape(
                    format!("{} output columns", self.output_dim()),
                    format!("{} output columns", y.ncols()),
                ));
            }
        }
        Ok(())
    }

    /// Forward pass keeping every layer's (pre-activation, activation)
    fn forward_trace(&self, x: &Array2<f64>) -> Vec<(Array2<f64>, Array2<f64>)> {
        let mut trace: Vec<(Array2<f64>, Array2<f64>)> = Vec::with_capacity(self.layers.len());
        for layer in &self.layers {
            let input = trace.last().map(|(_, a)| a).unwrap_or(x);
            let step = layer.forward(input);
            trace.push(step);
        }
        trace
    }

    /// Run inference
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_inputs(x, None)?;
        Ok(self.predict_unchecked(x))
    }

    fn predict_unchecked(&self, x: &Array2<f64>) -> Array2<f64> {
        self.layers
            .iter()
            .fold(x.clone(), |input, layer| layer.forward(&input).1)
    }

    /// One optimizer step on a batch; returns the batch (loss, accuracy) before the update
    pub fn train_on_batch(&mut self, x: &Array2<f64>, y: &Array2<f64>) -> Result<(f64, f64)> {
        let loss_fn = self.loss()?;
        self.check_inputs(x, Some(y))?;

        let trace = self.forward_trace(x);
        let Some((z_out, output)) = trace.last() else {
            return Err(KolosalError::ModelNotCompiled);
        };

        let loss = loss_fn.compute(y, output);
        let accuracy = categorical_accuracy(y, output);

        let last = self.layers.len() - 1;
        let mut delta = if loss_fn == Loss::CategoricalCrossentropy
            && self.layers[last].activation() == Activation::Softmax
        {
            // Softmax + cross-entropy collapses to (p - y) / n
            (output - y) / y.nrows() as f64
        } else {
            let grad = loss_fn.gradient(y, output);
            self.layers[last].activation().backward(z_out, output, &grad)
        };

        let mut grads = Vec::with_capacity(self.layers.len());
        for i in (0..self.layers.len()).rev() {
            let a_prev = if i == 0 { x } else { &trace[i - 1].1 };
            let grad_w = a_prev.t().dot(&delta);
            let grad_b = delta.sum_axis(Axis(0));

            if i > 0 {
                let upstream = delta.dot(&self.layers[i].weights.t());
                let (z, a) = &trace[i - 1];
                delta = self.layers[i - 1].activation().backward(z, a, &upstream);
            }
            grads.push((grad_w, grad_b));
        }
        grads.reverse();

        let Some(compiled) = self.compiled.as_mut() else {
            return Err(KolosalError::ModelNotCompiled);
        };
        let (mut weights, mut biases): (Vec<&mut Array2<f64>>, Vec<&mut Array1<f64>>) = self
            .layers
            .iter_mut()
            .map(|l| (&mut l.weights, &mut l.bias))
            .unzip();
        compiled.optimizer.step(&mut weights, &mut biases, &grads);

        Ok((loss, accuracy))
    }

    /// Train on in-memory arrays
    pub fn fit(
        &mut self,
        x: &Array2<f64>,
        y: &Array2<f64>,
        options: &FitOptions,
        validation: Option<(&Array2<f64>, &Array2<f64>)>,
        callbacks: &mut [&mut dyn Callback],
    ) -> Result<History> {
        self.loss()?;
        self.check_inputs(x, Some(y))?;
        if let Some((x_val, y_val)) = validation {
            self.check_inputs(x_val, Some(y_val))?;
        }
        if options.batch_size == 0 {
            return Err(KolosalError::invalid_param("batch_size", 0, "must be positive"));
        }
        if x.nrows() == 0 {
            return Err(KolosalError::DataError("no training samples".to_string()));
        }

        let n_samples = x.nrows();
        let mut history = History::new();

        for epoch in 0..options.epochs {
            let mut indices: Vec<usize> = (0..n_samples).collect();
            if options.shuffle {
                indices.shuffle(&mut self.rng);
            }

            let mut acc = Accumulator::default();
            for batch_indices in indices.chunks(options.batch_size) {
                let x_batch = x.select(Axis(0), batch_indices);
                let y_batch = y.select(Axis(0), batch_indices);
                let (loss, accuracy) = self.train_on_batch(&x_batch, &y_batch)?;
                acc.add(loss, accuracy, batch_indices.len());
            }

            let val = match validation {
                Some((x_val, y_val)) => Some(self.evaluate(x_val, y_val, options.batch_size)?),
                None => None,
            };

            self.finish_epoch(epoch, options, acc.finish("training")?, val, &mut history, callbacks)?;
        }

        Ok(history)
    }

    /// Train from batch generators, loading up to `workers` batches in parallel
    pub fn fit_generator(
        &mut self,
        training: &dyn BatchGenerator,
        validation: Option<&dyn BatchGenerator>,
        options: &FitOptions,
        callbacks: &mut [&mut dyn Callback],
    ) -> Result<History> {
        self.loss()?;
        if training.num_batches() == 0 {
            return Err(KolosalError::DataError("training generator yields no batches".to_string()));
        }
        let pool = loader_pool(options.workers)?;
        let workers = options.workers.max(1);
        let mut history = History::new();

        for epoch in 0..options.epochs {
            let mut order: Vec<usize> = (0..training.num_batches()).collect();
            if options.shuffle {
                order.shuffle(&mut self.rng);
            }

            let mut acc = Accumulator::default();
            for window in order.chunks(workers) {
                let batches = pool.install(|| {
                    window
                        .par_iter()
                        .map(|&i| training.batch(i))
                        .collect::<Result<Vec<_>>>()
                })?;

                for (x_batch, y_batch) in &batches {
                    let (loss, accuracy) = self.train_on_batch(x_batch, y_batch)?;
                    acc.add(loss, accuracy, x_batch.nrows());
                }
            }

            let val = match validation {
                Some(generator) => Some(self.evaluate_with_pool(generator, &pool, workers)?),
                None => None,
            };

            self.finish_epoch(epoch, options, acc.finish("training")?, val, &mut history, callbacks)?;
        }

        Ok(history)
    }

    fn finish_epoch(
        &self,
        epoch: usize,
        options: &FitOptions,
        train: Evaluation,
        val: Option<Evaluation>,
        history: &mut History,
        callbacks: &mut [&mut dyn Callback],
    ) -> Result<()> {
        let logs = EpochLogs {
            epoch,
            loss: train.loss,
            accuracy: train.accuracy,
            val_loss: val.map(|v| v.loss),
            val_accuracy: val.map(|v| v.accuracy),
        };

        if options.verbose {
            info!(
                epoch = epoch + 1,
                epochs = options.epochs,
                loss = logs.loss,
                acc = logs.accuracy,
                val_loss = ?logs.val_loss,
                val_acc = ?logs.val_accuracy,
                "Epoch finished"
            );
        }

        history.on_epoch_end(&logs, self)?;
        for cb in callbacks.iter_mut() {
            cb.on_epoch_end(&logs, self)?;
        }
        Ok(())
    }

    /// Loss and accuracy over arrays, computed in batches
    pub fn evaluate(&self, x: &Array2<f64>, y: &Array2<f64>, batch_size: usize) -> Result<Evaluation> {
        let loss_fn = self.loss()?;
        self.check_inputs(x, Some(y))?;
        let batch_size = batch_size.max(1);

        let mut acc = Accumulator::default();
        let mut start = 0;
        while start < x.nrows() {
            let end = (start + batch_size).min(x.nrows());
            let x_batch = x.slice(ndarray::s![start..end, ..]).to_owned();
            let y_batch = y.slice(ndarray::s![start..end, ..]).to_owned();
            let pred = self.predict_unchecked(&x_batch);
            acc.add(
                loss_fn.compute(&y_batch, &pred),
                categorical_accuracy(&y_batch, &pred),
                end - start,
            );
            start = end;
        }

        acc.finish("evaluation")
    }

    /// Loss and accuracy over every batch of a generator
    pub fn evaluate_generator(&self, generator: &dyn BatchGenerator, workers: usize) -> Result<Evaluation> {
        let pool = loader_pool(workers)?;
        self.evaluate_with_pool(generator, &pool, workers.max(1))
    }

    fn evaluate_with_pool(
        &self,
        generator: &dyn BatchGenerator,
        pool: &rayon::ThreadPool,
        workers: usize,
    ) -> Result<Evaluation> {
        let loss_fn = self.loss()?;
        let order: Vec<usize> = (0..generator.num_batches()).collect();

        let mut acc = Accumulator::default();
        for window in order.chunks(workers) {
            let batches = pool.install(|| {
                window
                    .par_iter()
                    .map(|&i| generator.batch(i))
                    .collect::<Result<Vec<_>>>()
            })?;

            for (x_batch, y_batch) in &batches {
                self.check_inputs(x_batch, Some(y_batch))?;
                let pred = self.predict_unchecked(x_batch);
                acc.add(
                    loss_fn.compute(y_batch, &pred),
                    categorical_accuracy(y_batch, &pred),
                    x_batch.nrows(),
                );
            }
        }

        acc.finish("evaluation")
    }

    /// Write layer weights to a JSON checkpoint
    pub fn save_weights(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = WeightsFile {
            layers: self
                .layers
                .iter()
                .map(|l| LayerWeights {
                    weights: l.weights.clone(),
                    bias: l.bias.clone(),
                })
                .collect(),
        };
        fs::write(path, serde_json::to_vec(&file)?)?;
        Ok(())
    }

    /// Restore layer weights written by [`Sequential::save_weights`]
    pub fn load_weights(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = fs::read(path)?;
        let file: WeightsFile = serde_json::from_slice(&bytes)?;

        if file.layers.len() != self.layers.len() {
            return Err(KolosalError::shape(
                format!("{} layers", self.layers.len()),
                format!("{} layers", file.layers.len()),
            ));
        }
        for (i, (saved, layer)) in file.layers.iter().zip(&self.layers).enumerate() {
            if saved.weights.dim() != layer.weights.dim() || saved.bias.len() != layer.bias.len() {
                return Err(KolosalError::shape(
                    format!("layer {} weights {:?}", i, layer.weights.dim()),
                    format!("{:?}", saved.weights.dim()),
                ));
            }
        }

        for (saved, layer) in file.layers.into_iter().zip(self.layers.iter_mut()) {
            layer.weights = saved.weights;
            layer.bias = saved.bias;
        }
        Ok(())
    }

    /// Write architecture and weights
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = ModelFile {
            input_dim: self.input_dim,
            layers: self.layers.clone(),
        };
        fs::write(path, serde_json::to_vec(&file)?)?;
        Ok(())
    }

    /// Read a model written by [`Sequential::save`]; it must be compiled again
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = fs::read(path)?;
        let file: ModelFile = serde_json::from_slice(&bytes)?;
        Ok(Self {
            input_dim: file.input_dim,
            layers: file.layers,
            rng: Xoshiro256PlusPlus::from_entropy(),
            compiled: None,
        })
    }
}

fn loader_pool(workers: usize) -> Result<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .thread_name(|i| format!("batch-loader-{}", i))
        .build()
        .map_err(|e| KolosalError::ThreadPoolError(e.to_string()))
}
