//! # Delay Math
//!
//! Numerical building blocks shared by the delay forecasting models:
//! summary statistics, normal quantiles, lag polynomials for (seasonal)
//! ARIMA models, a bounded Nelder-Mead optimiser and gap interpolation.

use thiserror::Error;

pub mod interpolation;
pub mod optimization;
pub mod polynomial;
pub mod stats;

/// Errors that can occur in numerical calculations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),
}

/// Result type for numerical operations
pub type Result<T> = std::result::Result<T, MathError>;

pub use optimization::{nelder_mead, NelderMeadConfig, NelderMeadResult};
pub use polynomial::LagPolynomial;
