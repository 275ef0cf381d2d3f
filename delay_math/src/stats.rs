//! Summary statistics and error metrics

use crate::{MathError, Result};
use statrs::distribution::{ContinuousCDF, Normal};

/// Arithmetic mean, or `None` for an empty slice
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample variance (n - 1 denominator)
pub fn variance(values: &[f64]) -> Result<f64> {
    if values.len() < 2 {
        return Err(MathError::InsufficientData(format!(
            "Variance needs at least 2 values, have {}",
            values.len()
        )));
    }

    let m = values.iter().sum::<f64>() / values.len() as f64;
    let ss = values.iter().map(|v| (v - m).powi(2)).sum::<f64>();
    Ok(ss / (values.len() - 1) as f64)
}

/// Sample standard deviation
pub fn std_dev(values: &[f64]) -> Result<f64> {
    variance(values).map(f64::sqrt)
}

/// Two-sided normal critical value for a confidence level, e.g. 0.95 -> 1.96
pub fn normal_critical_value(confidence_level: f64) -> Result<f64> {
    if !(confidence_level > 0.0 && confidence_level < 1.0) {
        return Err(MathError::InvalidInput(format!(
            "Confidence level must be between 0 and 1, got {}",
            confidence_level
        )));
    }

    let standard = Normal::new(0.0, 1.0)
        .map_err(|e| MathError::CalculationError(e.to_string()))?;
    Ok(standard.inverse_cdf(0.5 + confidence_level / 2.0))
}

/// Mean absolute error between two equally long series
pub fn mean_absolute_error(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    if actual.len() != predicted.len() || actual.is_empty() {
        return Err(MathError::InvalidInput(format!(
            "Actual ({}) and predicted ({}) must have the same non-zero length",
            actual.len(),
            predicted.len()
        )));
    }

    let sum: f64 = actual
        .iter()
        .zip(predicted.iter())
        .map(|(a, p)| (a - p).abs())
        .sum();
    Ok(sum / actual.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[]), None);
        assert_relative_eq!(mean(&[1.0, 2.0, 3.0, 4.0]).unwrap(), 2.5);
    }

    #[test]
    fn test_variance_and_std_dev() {
        assert_relative_eq!(variance(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap(), 2.5);
        assert_relative_eq!(
            std_dev(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap(),
            2.5_f64.sqrt()
        );
        assert!(variance(&[1.0]).is_err());
    }

    #[test]
    fn test_normal_critical_value() {
        assert_relative_eq!(normal_critical_value(0.95).unwrap(), 1.959964, epsilon = 1e-5);
        assert_relative_eq!(normal_critical_value(0.99).unwrap(), 2.575829, epsilon = 1e-5);
        assert!(normal_critical_value(1.0).is_err());
        assert!(normal_critical_value(0.0).is_err());
    }

    #[test]
    fn test_mean_absolute_error() {
        let actual = [10.0, 20.0, 30.0, 40.0, 50.0];
        let predicted = [12.0, 18.0, 33.0, 37.0, 52.0];
        assert_relative_eq!(mean_absolute_error(&actual, &predicted).unwrap(), 2.4);
        assert!(mean_absolute_error(&actual, &predicted[..2]).is_err());
        assert!(mean_absolute_error(&[], &[]).is_err());
    }
}
