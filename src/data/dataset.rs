//! Training/validation datasets and batch generators

use ndarray::{s, Array2};

use crate::error::{KolosalError, Result};

/// Source of mini-batches, indexed so batches can be loaded in parallel
pub trait BatchGenerator: Send + Sync {
    /// Number of batches per epoch
    fn num_batches(&self) -> usize;

    /// Load batch `index` as (features, one-hot targets)
    fn batch(&self, index: usize) -> Result<(Array2<f64>, Array2<f64>)>;

    /// Total samples across all batches
    fn num_samples(&self) -> usize;
}

/// In-memory train/validation split with one-hot targets
#[derive(Debug, Clone)]
pub struct ArrayDataset {
    pub x_train: Array2<f64>,
    pub y_train: Array2<f64>,
    pub x_val: Array2<f64>,
    pub y_val: Array2<f64>,
}

impl ArrayDataset {
    /// Build a dataset, checking that all four arrays agree in shape and
    /// neither split is empty
    pub fn new(
        x_train: Array2<f64>,
        y_train: Array2<f64>,
        x_val: Array2<f64>,
        y_val: Array2<f64>,
    ) -> Result<Self> {
        if x_train.nrows() == 0 {
            return Err(KolosalError::DataError("no training samples".to_string()));
        }
        if x_val.nrows() == 0 {
            return Err(KolosalError::DataError("no validation samples".to_string()));
        }
        if x_train.nrows() != y_train.nrows() {
            return Err(KolosalError::shape(
                format!("{} training targets", x_train.nrows()),
                y_train.nrows().to_string(),
            ));
        }
        if x_val.nrows() != y_val.nrows() {
            return Err(KolosalError::shape(
                format!("{} validation targets", x_val.nrows()),
                y_val.nrows().to_string(),
            ));
        }
        if x_train.ncols() != x_val.ncols() {
            return Err(KolosalError::shape(
                format!("{} validation features", x_train.ncols()),
                x_val.ncols().to_string(),
            ));
        }
        if y_train.ncols() != y_val.ncols() {
            return Err(KolosalError::shape(
                format!("{} validation classes", y_train.ncols()),
                y_val.ncols().to_string(),
            ));
        }

        Ok(Self { x_train, y_train, x_val, y_val })
    }

    pub fn num_features(&self) -> usize {
        self.x_train.ncols()
    }

    pub fn num_classes(&self) -> usize {
        self.y_train.ncols()
    }
}

/// [`BatchGenerator`] over in-memory arrays, in row order
#[derive(Debug, Clone)]
pub struct ArrayBatches {
    x: Array2<f64>,
    y: Array2<f64>,
    batch_size: usize,
}

impl ArrayBatches {
    pub fn new(x: Array2<f64>, y: Array2<f64>, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(KolosalError::invalid_param("batch_size", 0, "must be positive"));
        }
        if x.nrows() != y.nrows() {
            return Err(KolosalError::shape(
                format!("{} targets", x.nrows()),
                y.nrows().to_string(),
            ));
        }
        Ok(Self { x, y, batch_size })
    }
}

impl BatchGenerator for ArrayBatches {
    fn num_batches(&self) -> usize {
        self.x.nrows().div_ceil(self.batch_size)
    }

    fn batch(&self, index: usize) -> Result<(Array2<f64>, Array2<f64>)> {
        let start = index * self.batch_size;
        if start >= self.x.nrows() {
            return Err(KolosalError::DataError(format!(
                "batch index {} out of range ({} batches)",
                index,
                self.num_batches()
            )));
        }
        let end = (start + self.batch_size).min(self.x.nrows());
        Ok((
            self.x.slice(s![start..end, ..]).to_owned(),
            self.y.slice(s![start..end, ..]).to_owned(),
        ))
    }

    fn num_samples(&self) -> usize {
        self.x.nrows()
    }
}

/// Data a candidate network is trained and validated on
pub enum Dataset {
    /// Static arrays, trained with `fit`
    InMemory(ArrayDataset),
    /// Batch generators, trained with `fit_generator`
    Generators {
        training: Box<dyn BatchGenerator>,
        validation: Box<dyn BatchGenerator>,
    },
}

impl Dataset {
    pub fn generators(
        training: impl BatchGenerator + 'static,
        validation: impl BatchGenerator + 'static,
    ) -> Self {
        Dataset::Generators {
            training: Box::new(training),
            validation: Box::new(validation),
        }
    }

    pub fn uses_generator(&self) -> bool {
        matches!(self, Dataset::Generators { .. })
    }
}

impl From<ArrayDataset> for Dataset {
    fn from(data: ArrayDataset) -> Self {
        Dataset::InMemory(data)
    }
}

impl std::fmt::Debug for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dataset::InMemory(data) => f
                .debug_struct("InMemory")
                .field("train_samples", &data.x_train.nrows())
                .field("val_samples", &data.x_val.nrows())
                .field("features", &data.num_features())
                .field("classes", &data.num_classes())
                .finish(),
            Dataset::Generators { training, validation } => f
                .debug_struct("Generators")
                .field("train_batches", &training.num_batches())
                .field("val_batches", &validation.num_batches())
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_dataset_validates_rows() {
        let result = ArrayDataset::new(
            Array2::zeros((10, 3)),
            Array2::zeros((9, 2)),
            Array2::zeros((4, 3)),
            Array2::zeros((4, 2)),
        );
        assert!(matches!(result, Err(KolosalError::ShapeError { .. })));
    }

    #[test]
    fn test_array_dataset_validates_feature_width() {
        let result = ArrayDataset::new(
            Array2::zeros((10, 3)),
            Array2::zeros((10, 2)),
            Array2::zeros((4, 5)),
            Array2::zeros((4, 2)),
        );
        assert!(matches!(result, Err(KolosalError::ShapeError { .. })));
    }

    #[test]
    fn test_array_dataset_rejects_empty_splits() {
        let empty_val = ArrayDataset::new(
            Array2::zeros((10, 2)),
            Array2::zeros((10, 2)),
            Array2::zeros((0, 2)),
            Array2::zeros((0, 2)),
        );
        assert!(matches!(empty_val, Err(KolosalError::DataError(_))));

        let empty_train = ArrayDataset::new(
            Array2::zeros((0, 2)),
            Array2::zeros((0, 2)),
            Array2::zeros((4, 2)),
            Array2::zeros((4, 2)),
        );
        assert!(matches!(empty_train, Err(KolosalError::DataError(_))));
    }

    #[test]
    fn test_array_batches_partial_last_batch() {
        let x = Array2::from_shape_fn((10, 2), |(r, _)| r as f64);
        let y = Array2::zeros((10, 2));
        let batches = ArrayBatches::new(x, y, 4).unwrap();

        assert_eq!(batches.num_batches(), 3);
        assert_eq!(batches.num_samples(), 10);

        let (xb, yb) = batches.batch(2).unwrap();
        assert_eq!(xb.nrows(), 2);
        assert_eq!(yb.nrows(), 2);
        assert_eq!(xb[[0, 0]], 8.0);
        assert!(batches.batch(3).is_err());
    }

    #[test]
    fn test_array_batches_rejects_zero_batch_size() {
        let result = ArrayBatches::new(Array2::zeros((2, 2)), Array2::zeros((2, 2)), 0);
        assert!(matches!(result, Err(KolosalError::InvalidParameter { .. })));
    }
}
