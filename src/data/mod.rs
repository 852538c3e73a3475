//! Datasets for candidate training
//!
//! - In-memory train/validation arrays
//! - Indexed batch generators
//! - Labelled CSV loading

mod dataset;
pub mod loader;

pub use dataset::{ArrayBatches, ArrayDataset, BatchGenerator, Dataset};
pub use loader::{load_labeled_csv, LabeledData, LoaderOptions};
