//! Training callbacks: best-epoch checkpointing and history

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

use super::model::Sequential;
use crate::error::{KolosalError, Result};

/// Metrics recorded at the end of one epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochLogs {
    /// Zero-based epoch index
    pub epoch: usize,
    pub loss: f64,
    pub accuracy: f64,
    pub val_loss: Option<f64>,
    pub val_accuracy: Option<f64>,
}

/// Quantity watched by [`ModelCheckpoint`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Monitor {
    ValAccuracy,
    ValLoss,
    Accuracy,
    Loss,
}

impl Monitor {
    /// Read the monitored value from epoch logs
    pub fn value(&self, logs: &EpochLogs) -> Option<f64> {
        match self {
            Monitor::ValAccuracy => logs.val_accuracy,
            Monitor::ValLoss => logs.val_loss,
            Monitor::Accuracy => Some(logs.accuracy),
            Monitor::Loss => Some(logs.loss),
        }
    }

    /// Accuracy is maximised, loss minimised
    pub fn is_improvement(&self, current: f64, best: f64) -> bool {
        match self {
            Monitor::ValAccuracy | Monitor::Accuracy => current > best,
            Monitor::ValLoss | Monitor::Loss => current < best,
        }
    }

    fn initial_best(&self) -> f64 {
        match self {
            Monitor::ValAccuracy | Monitor::Accuracy => f64::NEG_INFINITY,
            Monitor::ValLoss | Monitor::Loss => f64::INFINITY,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Monitor::ValAccuracy => "val_acc",
            Monitor::ValLoss => "val_loss",
            Monitor::Accuracy => "acc",
            Monitor::Loss => "loss",
        }
    }
}

impl Default for Monitor {
    fn default() -> Self {
        Monitor::ValAccuracy
    }
}

impl fmt::Display for Monitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Monitor {
    type Err = KolosalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "val_acc" | "val_accuracy" => Ok(Monitor::ValAccuracy),
            "val_loss" => Ok(Monitor::ValLoss),
            "acc" | "accuracy" => Ok(Monitor::Accuracy),
            "loss" => Ok(Monitor::Loss),
            other => Err(KolosalError::invalid_param(
                "monitor",
                other,
                "expected val_acc, val_loss, acc or loss",
            )),
        }
    }
}

impl TryFrom<String> for Monitor {
    type Error = KolosalError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Monitor> for String {
    fn from(m: Monitor) -> Self {
        m.name().to_string()
    }
}

/// Hook invoked by the training loop
pub trait Callback {
    /// Called once after each epoch's metrics are known
    fn on_epoch_end(&mut self, logs: &EpochLogs, model: &Sequential) -> Result<()>;
}

/// Saves model weights whenever the monitored quantity improves
#[derive(Debug, Clone)]
pub struct ModelCheckpoint {
    path: PathBuf,
    monitor: Monitor,
    save_best_only: bool,
    save_weights_only: bool,
    best: f64,
    best_epoch: Option<usize>,
    saves: usize,
}

impl ModelCheckpoint {
    pub fn new(path: impl Into<PathBuf>, monitor: Monitor) -> Self {
        Self {
            path: path.into(),
            monitor,
            save_best_only: false,
            save_weights_only: true,
            best: monitor.initial_best(),
            best_epoch: None,
            saves: 0,
        }
    }

    pub fn with_save_best_only(mut self, save_best_only: bool) -> Self {
        self.save_best_only = save_best_only;
        self
    }

    pub fn with_save_weights_only(mut self, save_weights_only: bool) -> Self {
        self.save_weights_only = save_weights_only;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Best monitored value seen so far, if any epoch reported it
    pub fn best(&self) -> Option<f64> {
        self.best_epoch.map(|_| self.best)
    }

    pub fn best_epoch(&self) -> Option<usize> {
        self.best_epoch
    }

    /// Number of times the checkpoint file was written
    pub fn saves(&self) -> usize {
        self.saves
    }

    fn save(&mut self, model: &Sequential) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        if self.save_weights_only {
            model.save_weights(&self.path)?;
        } else {
            model.save(&self.path)?;
        }
        self.saves += 1;
        Ok(())
    }
}

impl Callback for ModelCheckpoint {
    fn on_epoch_end(&mut self, logs: &EpochLogs, model: &Sequential) -> Result<()> {
        let Some(current) = self.monitor.value(logs) else {
            warn!(
                monitor = %self.monitor,
                "Can save best model only with {} available, skipping",
                self.monitor
            );
            return Ok(());
        };

        if !self.save_best_only {
            self.save(model)?;
            if self.monitor.is_improvement(current, self.best) {
                self.best = current;
                self.best_epoch = Some(logs.epoch);
            }
            return Ok(());
        }

        if self.monitor.is_improvement(current, self.best) {
            info!(
                epoch = logs.epoch + 1,
                monitor = %self.monitor,
                previous = self.best,
                current,
                path = %self.path.display(),
                "Monitored value improved, saving model"
            );
            self.best = current;
            self.best_epoch = Some(logs.epoch);
            self.save(model)?;
        } else {
            debug!(
                epoch = logs.epoch + 1,
                monitor = %self.monitor,
                best = self.best,
                "Monitored value did not improve"
            );
        }

        Ok(())
    }
}

/// Records the logs of every epoch
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct History {
    pub epochs: Vec<EpochLogs>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    pub fn last(&self) -> Option<&EpochLogs> {
        self.epochs.last()
    }
}

impl Callback for History {
    fn on_epoch_end(&mut self, logs: &EpochLogs, _model: &Sequential) -> Result<()> {
        self.epochs.push(logs.clone());
        Ok(())
    }
}
