//! Lag (backshift) polynomials for ARIMA-family models
//!
//! A polynomial `1 + c1 B + c2 B^2 + ...` is stored as its coefficient
//! vector indexed by power, so `coefficients()[0]` is always the constant.

use crate::{MathError, Result};

/// Polynomial in the backshift operator B
#[derive(Debug, Clone, PartialEq)]
pub struct LagPolynomial {
    coefficients: Vec<f64>,
}

impl LagPolynomial {
    /// The identity polynomial `1`
    pub fn one() -> Self {
        Self {
            coefficients: vec![1.0],
        }
    }

    /// Build from raw coefficients, lowest power first
    pub fn from_coefficients(coefficients: Vec<f64>) -> Result<Self> {
        if coefficients.is_empty() {
            return Err(MathError::InvalidInput(
                "Polynomial needs at least a constant term".to_string(),
            ));
        }
        Ok(Self { coefficients })
    }

    /// Autoregressive form `1 - a1 B^s - a2 B^2s - ...`
    pub fn autoregressive(coefficients: &[f64], step: usize) -> Self {
        Self::sparse(coefficients, step, -1.0)
    }

    /// Moving average form `1 + b1 B^s + b2 B^2s + ...`
    pub fn moving_average(coefficients: &[f64], step: usize) -> Self {
        Self::sparse(coefficients, step, 1.0)
    }

    /// Differencing operator `(1 - B)^d (1 - B^s)^D`
    pub fn differencing(d: usize, seasonal_d: usize, period: usize) -> Self {
        let mut result = Self::one();
        for _ in 0..d {
            result = result.multiply(&Self::autoregressive(&[1.0], 1));
        }
        if period > 0 {
            for _ in 0..seasonal_d {
                result = result.multiply(&Self::autoregressive(&[1.0], period));
            }
        }
        result
    }

    fn sparse(coefficients: &[f64], step: usize, sign: f64) -> Self {
        let step = step.max(1);
        let mut out = vec![0.0; coefficients.len() * step + 1];
        out[0] = 1.0;
        for (i, c) in coefficients.iter().enumerate() {
            out[(i + 1) * step] = sign * c;
        }
        Self { coefficients: out }
    }

    /// Polynomial product
    pub fn multiply(&self, other: &LagPolynomial) -> LagPolynomial {
        let mut out = vec![0.0; self.coefficients.len() + other.coefficients.len() - 1];
        for (i, a) in self.coefficients.iter().enumerate() {
            for (j, b) in other.coefficients.iter().enumerate() {
                out[i + j] += a * b;
            }
        }
        LagPolynomial { coefficients: out }
    }

    /// Highest power
    pub fn degree(&self) -> usize {
        self.coefficients.len() - 1
    }

    /// Coefficient of `B^power`, zero past the degree
    pub fn coefficient(&self, power: usize) -> f64 {
        self.coefficients.get(power).copied().unwrap_or(0.0)
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// Right-hand weights of an autoregressive polynomial written as
    /// `x_t = w1 x_{t-1} + w2 x_{t-2} + ...`
    pub fn recursion_weights(&self) -> Vec<f64> {
        self.coefficients.iter().skip(1).map(|c| -c).collect()
    }
}

/// Psi weights of the MA(infinity) representation of `ar(B) x_t = ma(B) e_t`
///
/// `ar` must already include any differencing factors. The first weight is 1.
pub fn psi_weights(ar: &LagPolynomial, ma: &LagPolynomial, count: usize) -> Vec<f64> {
    let phi = ar.recursion_weights();
    let mut psi = Vec::with_capacity(count);

    for j in 0..count {
        if j == 0 {
            psi.push(1.0);
            continue;
        }
        let mut value = ma.coefficient(j);
        for (k, weight) in phi.iter().enumerate().take(j) {
            value += weight * psi[j - k - 1];
        }
        psi.push(value);
    }

    psi
}

/// Apply `(1 - B^lag)` repeatedly to a series
pub fn difference(series: &[f64], lag: usize, times: usize) -> Vec<f64> {
    let mut result = series.to_vec();
    if lag == 0 {
        return result;
    }
    for _ in 0..times {
        if result.len() <= lag {
            return Vec::new();
        }
        result = (lag..result.len())
            .map(|i| result[i] - result[i - lag])
            .collect();
    }
    result
}
