//! Error types for the Kolosal NAS harness

use thiserror::Error;

/// Result type alias for Kolosal NAS operations
pub type Result<T> = std::result::Result<T, KolosalError>;

/// Main error type for the NAS harness
#[derive(Error, Debug)]
pub enum KolosalError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Model not compiled")]
    ModelNotCompiled,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Parse error on line {line}: {reason}")]
    ParseError { line: usize, reason: String },

    #[error("Thread pool error: {0}")]
    ThreadPoolError(String),
}

impl KolosalError {
    pub(crate) fn shape(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        KolosalError::ShapeError {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub(crate) fn invalid_param(
        name: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        KolosalError::InvalidParameter {
            name: name.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<polars::error::PolarsError> for KolosalError {
    fn from(err: polars::error::PolarsError) -> Self {
        KolosalError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for KolosalError {
    fn from(err: serde_json::Error) -> Self {
        KolosalError::SerializationError(err.to_string())
    }
}

impl From<csv::Error> for KolosalError {
    fn from(err: csv::Error) -> Self {
        let line = err
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(0);
        KolosalError::ParseError {
            line,
            reason: err.to_string(),
        }
    }
}

impl From<ndarray::ShapeError> for KolosalError {
    fn from(err: ndarray::ShapeError) -> Self {
        KolosalError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
