//! Labelled CSV loading
//!
//! Reads a headed CSV with polars, one-hot encodes the target column and
//! splits the rows into training and validation arrays.

use ndarray::{Array2, Axis};
use polars::prelude::*;
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use super::dataset::ArrayDataset;
use crate::error::{KolosalError, Result};

/// Options for [`load_labeled_csv`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderOptions {
    /// Fraction of rows held out for validation
    pub val_split: f64,
    /// Shuffle seed (None = entropy)
    pub seed: Option<u64>,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            val_split: 0.2,
            seed: Some(42),
        }
    }
}

impl LoaderOptions {
    pub fn with_val_split(mut self, val_split: f64) -> Self {
        self.val_split = val_split;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }
}

/// Dataset loaded from a CSV file, plus the class labels in one-hot column order
#[derive(Debug, Clone)]
pub struct LabeledData {
    pub dataset: ArrayDataset,
    pub feature_names: Vec<String>,
    pub classes: Vec<String>,
}

/// Load a headed CSV: every column except `target` becomes a feature
pub fn load_labeled_csv(
    path: impl AsRef<Path>,
    target: &str,
    options: &LoaderOptions,
) -> Result<LabeledData> {
    let path = path.as_ref();
    if !(options.val_split > 0.0 && options.val_split < 1.0) {
        return Err(KolosalError::invalid_param(
            "val_split",
            options.val_split,
            "must lie strictly between 0 and 1",
        ));
    }

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(1000))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    debug!(path = %path.display(), rows = df.height(), cols = df.width(), "Loaded CSV");
    labeled_from_frame(&df, target, options)
}

/// Split an in-memory frame the same way [`load_labeled_csv`] does
pub fn labeled_from_frame(df: &DataFrame, target: &str, options: &LoaderOptions) -> Result<LabeledData> {
    let n_rows = df.height();
    if n_rows < 2 {
        return Err(KolosalError::DataError(format!(
            "need at least 2 rows to split, got {}",
            n_rows
        )));
    }

    let feature_names: Vec<String> = df
        .get_column_names()
        .into_iter()
        .filter(|name| name.as_str() != target)
        .map(|s| s.to_string())
        .collect();

    let target_col = df
        .column(target)
        .map_err(|_| KolosalError::FeatureNotFound(target.to_string()))?;
    let labels: Vec<String> = target_col
        .cast(&DataType::String)?
        .str()?
        .into_iter()
        .map(|v| v.unwrap_or("").to_string())
        .collect();

    let mut classes = labels.clone();
    classes.sort();
    classes.dedup();

    let x = columns_to_array2(df, &feature_names)?;
    let mut y = Array2::zeros((n_rows, classes.len()));
    for (row, label) in labels.iter().enumerate() {
        // classes is sorted and contains every label
        if let Ok(class_idx) = classes.binary_search(label) {
            y[[row, class_idx]] = 1.0;
        }
    }

    let mut rng = match options.seed {
        Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
        None => Xoshiro256PlusPlus::from_entropy(),
    };
    let mut indices: Vec<usize> = (0..n_rows).collect();
    indices.shuffle(&mut rng);

    let val_size = (n_rows as f64 * options.val_split).round() as usize;
    let train_size = n_rows.saturating_sub(val_size);
    if val_size == 0 || train_size == 0 {
        return Err(KolosalError::DataError(format!(
            "val_split {} leaves an empty split for {} rows",
            options.val_split, n_rows
        )));
    }

    let (train_idx, val_idx) = indices.split_at(train_size);
    let dataset = ArrayDataset::new(
        x.select(Axis(0), train_idx),
        y.select(Axis(0), train_idx),
        x.select(Axis(0), val_idx),
        y.select(Axis(0), val_idx),
    )?;

    Ok(LabeledData {
        dataset,
        feature_names,
        classes,
    })
}

fn columns_to_array2(df: &DataFrame, col_names: &[String]) -> Result<Array2<f64>> {
    let n_rows = df.height();

    let col_data: Vec<Vec<f64>> = col_names
        .iter()
        .map(|col_name| {
            let series = df
                .column(col_name)
                .map_err(|_| KolosalError::FeatureNotFound(col_name.clone()))?;
            let series_f64 = series.cast(&DataType::Float64)?;
            let values: Vec<f64> = series_f64
                .f64()?
                .into_iter()
                .map(|v| v.unwrap_or(0.0))
                .collect();
            Ok(values)
        })
        .collect::<Result<Vec<Vec<f64>>>>()?;

    Ok(Array2::from_shape_fn((n_rows, col_names.len()), |(r, c)| col_data[c][r]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn frame() -> DataFrame {
        df!(
            "f1" => &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0],
            "f2" => &[10.0, 9.0, 8.0, 7.0, 6.0, 5.0, 4.0, 3.0, 2.0, 1.0],
            "label" => &["cat", "dog", "cat", "dog", "cat", "dog", "cat", "dog", "bird", "bird"]
        )
        .unwrap()
    }

    #[test]
    fn test_split_and_one_hot() {
        let data = labeled_from_frame(&frame(), "label", &LoaderOptions::default()).unwrap();

        assert_eq!(data.classes, vec!["bird", "cat", "dog"]);
        assert_eq!(data.feature_names, vec!["f1", "f2"]);
        assert_eq!(data.dataset.x_train.nrows(), 8);
        assert_eq!(data.dataset.x_val.nrows(), 2);
        assert_eq!(data.dataset.num_classes(), 3);
        for row in data.dataset.y_train.rows() {
            assert_eq!(row.sum(), 1.0);
        }
    }

    #[test]
    fn test_missing_target() {
        let result = labeled_from_frame(&frame(), "nope", &LoaderOptions::default());
        assert!(matches!(result, Err(KolosalError::FeatureNotFound(_))));
    }

    #[test]
    fn test_bad_val_split() {
        let options = LoaderOptions::default().with_val_split(1.0);
        let dir = tempfile::tempdir().unwrap();
        let result = load_labeled_csv(dir.path().join("x.csv"), "label", &options);
        assert!(matches!(result, Err(KolosalError::InvalidParameter { .. })));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "a,b,y").unwrap();
        for i in 0..20 {
            writeln!(file, "{},{},{}", i, 20 - i, i % 2).unwrap();
        }
        drop(file);

        let options = LoaderOptions::default().with_val_split(0.25);
        let data = load_labeled_csv(&path, "y", &options).unwrap();

        assert_eq!(data.classes, vec!["0", "1"]);
        assert_eq!(data.dataset.x_train.nrows(), 15);
        assert_eq!(data.dataset.x_val.nrows(), 5);
        assert_eq!(data.dataset.num_features(), 2);
    }
}
