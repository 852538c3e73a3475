//! Kolosal NAS - Reward evaluation for neural architecture search
//!
//! This crate provides the pieces a search controller needs to score
//! candidate architectures:
//! - A small dense-network framework with Adam, checkpoints and generators
//! - Labelled CSV loading into train/validation splits
//! - The network manager that turns actions into a reward
//! - The training-history log and its ranker
//!
//! # Modules
//!
//! - [`network`] - Sequential dense networks, losses, Adam and callbacks
//! - [`data`] - In-memory datasets, batch generators and CSV loading
//! - [`nas`] - Network manager, action builder and search history
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Neural network framework
pub mod network;

// Data loading
pub mod data;

// Architecture search
pub mod nas;

// Services
pub mod cli;

pub use error::{KolosalError, Result};

/// Prelude module for convenient imports
pub mod prelude {
    // Error handling
    pub use crate::error::{KolosalError, Result};

    // Network
    pub use crate::network::{
        Activation, Adam, AdamConfig, Callback, EpochLogs, FitOptions, Loss, ModelCheckpoint, Monitor,
        Sequential,
    };

    // Data
    pub use crate::data::{ArrayBatches, ArrayDataset, BatchGenerator, Dataset, LoaderOptions, load_labeled_csv};

    // Search
    pub use crate::nas::{
        ActionValue, CandidateEvaluation, DenseActionBuilder, HistoryRecord, ManagerConfig, NetworkManager,
        parse_actions, rank, read_history,
    };
}
