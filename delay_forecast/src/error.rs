//! Error types for the delay_forecast crate

use polars::prelude::PolarsError;
use thiserror::Error;

/// Custom error types for the delay_forecast crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// A raw input file is malformed or lacks a required column
    #[error("Data format error in {file}: {reason}")]
    DataFormat { file: String, reason: String },

    /// An airport does not have enough months for the requested operation
    #[error("Insufficient history for {airport}: need {needed} months, have {got}")]
    InsufficientHistory {
        airport: String,
        needed: usize,
        got: usize,
    },

    /// A model failed to fit or forecast a specific airport
    #[error("Model fit error ({model}) for {airport}: {reason}")]
    ModelFit {
        airport: String,
        model: String,
        reason: String,
    },

    /// A chart could not be rendered or saved
    #[error("Render error for {chart}: {reason}")]
    Render { chart: String, reason: String },

    /// A failure that makes continuing the pipeline pointless
    #[error("Pipeline halted: {0}")]
    Systemic(String),

    /// Error related to data validation or processing
    #[error("Data error: {0}")]
    DataError(String),

    /// Error related to parameter validation
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A requested airport or artifact does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error from mathematical operations
    #[error("Math error: {0}")]
    Math(#[from] delay_math::MathError),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    PolarsError(String),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<PolarsError> for ForecastError {
    fn from(err: PolarsError) -> Self {
        ForecastError::PolarsError(err.to_string())
    }
}

impl From<config::ConfigError> for ForecastError {
    fn from(err: config::ConfigError) -> Self {
        ForecastError::Config(err.to_string())
    }
}

impl ForecastError {
    pub(crate) fn model_fit(
        airport: impl Into<String>,
        model: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        ForecastError::ModelFit {
            airport: airport.into(),
            model: model.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn render(chart: impl Into<String>, reason: impl ToString) -> Self {
        ForecastError::Render {
            chart: chart.into(),
            reason: reason.to_string(),
        }
    }
}
