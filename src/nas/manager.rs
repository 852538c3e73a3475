//! Network Manager
//!
//! Turns a controller's actions into a reward: build the candidate network,
//! train it briefly, keep the best epoch and score it on validation data.

use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

use super::config::ManagerConfig;
use crate::data::Dataset;
use crate::error::{KolosalError, Result};
use crate::network::{Adam, FitOptions, Loss, ModelCheckpoint, Sequential};

/// Outcome of training and scoring one candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateEvaluation {
    /// Validation accuracy of the best checkpoint
    pub reward: f64,
    /// Validation loss of the best checkpoint
    pub val_loss: f64,
    /// Zero-based epoch the checkpoint was taken at
    pub best_epoch: Option<usize>,
    pub epochs_trained: usize,
    pub num_params: usize,
    pub train_time_secs: f64,
}

/// Trains candidate networks on a fixed dataset and reports their rewards
#[derive(Debug)]
pub struct NetworkManager {
    dataset: Dataset,
    config: ManagerConfig,
}

impl NetworkManager {
    pub fn new(dataset: impl Into<Dataset>, config: ManagerConfig) -> Self {
        Self {
            dataset: dataset.into(),
            config,
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Build a network from `actions`, train it and return its validation accuracy
    pub fn get_rewards<A, F>(&self, model_fn: F, actions: &[A]) -> Result<f64>
    where
        F: FnOnce(&[A]) -> Result<Sequential>,
    {
        self.evaluate_candidate(model_fn, actions).map(|eval| eval.reward)
    }

    /// Same as [`NetworkManager::get_rewards`], keeping the training details
    pub fn evaluate_candidate<A, F>(&self, model_fn: F, actions: &[A]) -> Result<CandidateEvaluation>
    where
        F: FnOnce(&[A]) -> Result<Sequential>,
    {
        self.config.validate()?;
        let start = Instant::now();

        let mut model = model_fn(actions)?;
        // Redraws the initial weights as well as seeding the shuffles
        if let Some(seed) = self.config.seed {
            model = model.with_seed(seed);
        }
        let optimizer = Adam::with_learning_rate(self.config.learning_rate, self.config.amsgrad);
        model.compile(optimizer, Loss::CategoricalCrossentropy)?;

        let num_params = model.num_params();
        debug!(num_params, layers = model.layers().len(), "Built candidate network");

        let checkpoint_path = &self.config.checkpoint_path;
        // A previous candidate's checkpoint must never be reloaded
        if checkpoint_path.exists() {
            std::fs::remove_file(checkpoint_path)?;
        }

        let mut checkpoint = ModelCheckpoint::new(checkpoint_path, self.config.monitor)
            .with_save_best_only(true)
            .with_save_weights_only(true);

        let options = FitOptions::new(self.config.epochs, self.config.batch_size)
            .with_verbose(self.config.verbose)
            .with_workers(self.config.workers);

        let history = match &self.dataset {
            Dataset::InMemory(data) => model.fit(
                &data.x_train,
                &data.y_train,
                &options,
                Some((&data.x_val, &data.y_val)),
                &mut [&mut checkpoint],
            )?,
            Dataset::Generators { training, validation } => model.fit_generator(
                &**training,
                Some(&**validation),
                &options,
                &mut [&mut checkpoint],
            )?,
        };

        if !checkpoint_path.exists() {
            return Err(KolosalError::TrainingError(format!(
                "no checkpoint was written to {} (monitor {} never improved)",
                checkpoint_path.display(),
                self.config.monitor
            )));
        }

        // load best performance epoch in this training session
        model.load_weights(checkpoint_path)?;

        let evaluation = match &self.dataset {
            Dataset::InMemory(data) => model.evaluate(&data.x_val, &data.y_val, self.config.batch_size)?,
            Dataset::Generators { validation, .. } => {
                model.evaluate_generator(&**validation, self.config.workers)?
            }
        };

        let reward = evaluation.accuracy;
        info!(reward, val_loss = evaluation.loss, "Manager: Accuracy = {}", reward);

        Ok(CandidateEvaluation {
            reward,
            val_loss: evaluation.loss,
            best_epoch: checkpoint.best_epoch(),
            epochs_trained: history.len(),
            num_params,
            train_time_secs: start.elapsed().as_secs_f64(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ArrayBatches, ArrayDataset};
    use crate::network::Activation;
    use ndarray::Array2;

    fn blobs(n: usize) -> (Array2<f64>, Array2<f64>) {
        let mut x = Array2::zeros((n, 2));
        let mut y = Array2::zeros((n, 2));
        for i in 0..n {
            let class = i % 2;
            let offset = if class == 0 { -1.0 } else { 1.0 };
            x[[i, 0]] = offset + (i as f64 * 0.11).cos() * 0.2;
            x[[i, 1]] = offset;
            y[[i, class]] = 1.0;
        }
        (x, y)
    }

    fn dataset() -> ArrayDataset {
        let (x, y) = blobs(160);
        let (xv, yv) = blobs(40);
        ArrayDataset::new(x, y, xv, yv).unwrap()
    }

    fn model_fn(actions: &[usize]) -> Result<Sequential> {
        let mut model = Sequential::new(2).with_seed(1);
        for &units in actions {
            model = model.add(units, Activation::ReLU);
        }
        Ok(model.add(2, Activation::Softmax))
    }

    fn config(dir: &tempfile::TempDir) -> ManagerConfig {
        ManagerConfig::default()
            .with_epochs(5)
            .with_batch_size(16)
            .with_learning_rate(0.05)
            .with_verbose(false)
            .with_seed(7)
            .with_checkpoint_path(dir.path().join("weights").join("temp_network.json"))
    }

    #[test]
    fn test_reward_is_validation_accuracy() {
        let dir = tempfile::tempdir().unwrap();
        let manager = NetworkManager::new(dataset(), config(&dir));

        let eval = manager.evaluate_candidate(model_fn, &[8]).unwrap();

        assert!((0.0..=1.0).contains(&eval.reward));
        assert!(eval.reward > 0.9, "reward {} should be above 0.9", eval.reward);
        assert_eq!(eval.epochs_trained, 5);
        assert!(eval.best_epoch.is_some());
        assert_eq!(eval.num_params, 2 * 8 + 8 + 8 * 2 + 2);
        assert!(manager.config().checkpoint_path.exists());
    }

    #[test]
    fn test_get_rewards_matches_candidate_reward() {
        let dir = tempfile::tempdir().unwrap();
        let manager = NetworkManager::new(dataset(), config(&dir));

        let reward = manager.get_rewards(model_fn, &[4]).unwrap();
        let eval = manager.evaluate_candidate(model_fn, &[4]).unwrap();
        assert!((reward - eval.reward).abs() < 1e-12);
    }

    #[test]
    fn test_model_fn_error_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let manager = NetworkManager::new(dataset(), config(&dir));

        let result = manager.get_rewards(
            |_: &[usize]| Err(KolosalError::invalid_param("units", 0, "must be positive")),
            &[0],
        );
        assert!(matches!(result, Err(KolosalError::InvalidParameter { .. })));
    }

    #[test]
    fn test_stale_checkpoint_is_never_loaded() {
        let dir = tempfile::tempdir().unwrap();
        // A loadable checkpoint of the right shape left by an earlier run
        let cfg = config(&dir).with_monitor(crate::network::Monitor::ValLoss);
        std::fs::create_dir_all(cfg.checkpoint_path.parent().unwrap()).unwrap();
        model_fn(&[4]).unwrap().save_weights(&cfg.checkpoint_path).unwrap();

        // NaN validation loss never improves, so this run writes no checkpoint
        let (x, mut y) = blobs(20);
        y.fill(f64::NAN);
        let data = ArrayDataset::new(x.clone(), y.clone(), x, y).unwrap();
        let manager = NetworkManager::new(data, cfg);

        let result = manager.get_rewards(model_fn, &[4]);
        assert!(matches!(result, Err(KolosalError::TrainingError(_))), "{:?}", result);
    }

    #[test]
    fn test_reward_comes_from_best_epoch_weights() {
        let dir = tempfile::tempdir().unwrap();
        let (x, y) = blobs(160);
        let (xv, yv) = blobs(40);
        // Validation labels are swapped, so fitting the training set makes
        // validation loss worse every epoch
        let yv_swapped = yv.select(ndarray::Axis(1), &[1, 0]);
        let data = ArrayDataset::new(x, y, xv.clone(), yv_swapped.clone()).unwrap();
        let cfg = config(&dir).with_epochs(6).with_monitor(crate::network::Monitor::ValLoss);
        let checkpoint_path = cfg.checkpoint_path.clone();
        let manager = NetworkManager::new(data, cfg);

        let eval = manager.evaluate_candidate(model_fn, &[8]).unwrap();
        let best_epoch = eval.best_epoch.unwrap();
        assert!(best_epoch < eval.epochs_trained - 1, "best epoch {} is the last", best_epoch);

        let mut best = model_fn(&[8]).unwrap();
        best.compile(Adam::with_learning_rate(0.05, true), Loss::CategoricalCrossentropy)
            .unwrap();
        best.load_weights(&checkpoint_path).unwrap();
        let expected = best.evaluate(&xv, &yv_swapped, 16).unwrap();

        assert_eq!(eval.reward, expected.accuracy);
        assert!((eval.val_loss - expected.loss).abs() < 1e-12);
    }

    #[test]
    fn test_seed_makes_candidates_reproducible() {
        let dir = tempfile::tempdir().unwrap();
        let manager = NetworkManager::new(dataset(), config(&dir));
        let unseeded = |actions: &[usize]| -> Result<Sequential> {
            let mut model = Sequential::new(2);
            for &units in actions {
                model = model.add(units, Activation::ReLU);
            }
            Ok(model.add(2, Activation::Softmax))
        };

        let first = manager.evaluate_candidate(unseeded, &[8]).unwrap();
        let second = manager.evaluate_candidate(unseeded, &[8]).unwrap();

        assert_eq!(first.val_loss, second.val_loss);
        assert_eq!(first.reward, second.reward);
        assert_eq!(first.best_epoch, second.best_epoch);
    }

    #[test]
    fn test_empty_validation_generator_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let (x, y) = blobs(40);
        let data = Dataset::generators(
            ArrayBatches::new(x, y, 16).unwrap(),
            ArrayBatches::new(Array2::zeros((0, 2)), Array2::zeros((0, 2)), 16).unwrap(),
        );
        let manager = NetworkManager::new(data, config(&dir));

        let result = manager.get_rewards(model_fn, &[4]);
        assert!(matches!(result, Err(KolosalError::DataError(_))), "{:?}", result);
    }

    #[test]
    fn test_missing_checkpoint_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        // NaN validation loss never counts as an improvement
        let cfg = config(&dir).with_monitor(crate::network::Monitor::ValLoss);
        let (x, mut y) = blobs(20);
        y.fill(f64::NAN);
        let data = ArrayDataset::new(x.clone(), y.clone(), x, y).unwrap();
        let manager = NetworkManager::new(data, cfg);

        let result = manager.get_rewards(model_fn, &[4]);
        assert!(matches!(result, Err(KolosalError::TrainingError(_))));
    }

    #[test]
    fn test_generator_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let (x, y) = blobs(160);
        let (xv, yv) = blobs(40);
        let data = Dataset::generators(
            ArrayBatches::new(x, y, 16).unwrap(),
            ArrayBatches::new(xv, yv, 16).unwrap(),
        );
        let manager = NetworkManager::new(data, config(&dir).with_workers(2));

        let reward = manager.get_rewards(model_fn, &[8]).unwrap();
        assert!(reward > 0.9, "reward {} should be above 0.9", reward);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let manager = NetworkManager::new(dataset(), config(&dir).with_batch_size(0));
        let result = manager.get_rewards(model_fn, &[4]);
        assert!(matches!(result, Err(KolosalError::InvalidParameter { .. })));
    }
}
