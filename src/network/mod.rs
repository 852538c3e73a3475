//! Feed-forward training framework
//!
//! Provides the model lifecycle the NAS manager drives:
//! - Dense layers and activations
//! - Categorical cross-entropy / MSE losses and accuracy
//! - Adam optimizer with AMSGrad
//! - Best-epoch checkpointing callbacks
//! - Sequential model with fit, evaluate and weight persistence

mod callbacks;
mod layers;
mod loss;
mod model;
mod optimizer;

pub use callbacks::{Callback, EpochLogs, History, ModelCheckpoint, Monitor};
pub use layers::{Activation, Dense};
pub use loss::{categorical_accuracy, Loss};
pub use model::{Evaluation, FitOptions, Sequential};
pub use optimizer::{Adam, AdamConfig};
