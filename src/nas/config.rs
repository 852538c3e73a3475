//! Network manager configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{KolosalError, Result};
use crate::network::Monitor;

/// Settings for training and scoring one candidate network
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Number of epochs to train each candidate
    pub epochs: usize,
    /// Mini-batch size for training and evaluation
    pub batch_size: usize,
    /// Quantity the checkpoint keeps the best epoch of
    pub monitor: Monitor,
    /// Adam learning rate
    pub learning_rate: f64,
    /// Use the AMSGrad variant of Adam
    pub amsgrad: bool,
    /// Where the best epoch's weights are written
    pub checkpoint_path: PathBuf,
    /// Batch loader threads when training from generators
    pub workers: usize,
    /// Log a line per epoch
    pub verbose: bool,
    /// Seed for weight initialization and batch shuffling (None = entropy)
    pub seed: Option<u64>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            epochs: 5,
            batch_size: 128,
            monitor: Monitor::ValAccuracy,
            learning_rate: 1e-3,
            amsgrad: true,
            checkpoint_path: PathBuf::from("weights/temp_network.json"),
            workers: 6,
            verbose: true,
            seed: None,
        }
    }
}

impl ManagerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a JSON config; missing fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_monitor(mut self, monitor: Monitor) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_amsgrad(mut self, amsgrad: bool) -> Self {
        self.amsgrad = amsgrad;
        self
    }

    pub fn with_checkpoint_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.checkpoint_path = path.into();
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(KolosalError::invalid_param("epochs", self.epochs, "must be positive"));
        }
        if self.batch_size == 0 {
            return Err(KolosalError::invalid_param("batch_size", self.batch_size, "must be positive"));
        }
        if self.workers == 0 {
            return Err(KolosalError::invalid_param("workers", self.workers, "must be positive"));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(KolosalError::invalid_param(
                "learning_rate",
                self.learning_rate,
                "must be a positive finite number",
            ));
        }
        Ok(())
    }
}
