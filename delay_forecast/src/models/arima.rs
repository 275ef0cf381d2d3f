//! ARIMA and seasonal ARIMA models
//!
//! Coefficients are estimated by conditional sum of squares (CSS) on the
//! differenced series, minimised with a bounded Nelder-Mead search. Forecasts
//! run the recursion of the expanded model on the original scale, and the
//! 95% interval at horizon h uses the psi weights of that model:
//! `var_h = sigma^2 * sum_{j<h} psi_j^2`.

use crate::config::ArimaConfig;
use crate::data::AirportSeries;
use crate::error::{ForecastError, Result};
use crate::models::{ForecastModel, ModelForecast, TrainedForecastModel};
use crate::month::YearMonth;
use crate::INTERVAL_LEVEL;
use delay_math::polynomial::{difference, psi_weights};
use delay_math::stats::{mean, normal_critical_value};
use delay_math::{nelder_mead, LagPolynomial, NelderMeadConfig};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Coefficient bound keeping the search inside the stationary/invertible region
const COEFFICIENT_BOUND: f64 = 0.99;

/// Penalty returned for parameter sets whose residuals blow up
const PENALTY: f64 = 1e300;

/// Order `(p,d,q)(P,D,Q)s` of a (seasonal) ARIMA model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArimaOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
    #[serde(default)]
    pub seasonal_p: usize,
    #[serde(default)]
    pub seasonal_d: usize,
    #[serde(default)]
    pub seasonal_q: usize,
    /// Season length in months; 0 for a non-seasonal model
    #[serde(default)]
    pub period: usize,
}

impl ArimaOrder {
    pub fn new(p: usize, d: usize, q: usize) -> Self {
        Self {
            p,
            d,
            q,
            seasonal_p: 0,
            seasonal_d: 0,
            seasonal_q: 0,
            period: 0,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn seasonal(
        p: usize,
        d: usize,
        q: usize,
        seasonal_p: usize,
        seasonal_d: usize,
        seasonal_q: usize,
        period: usize,
    ) -> Self {
        Self {
            p,
            d,
            q,
            seasonal_p,
            seasonal_d,
            seasonal_q,
            period,
        }
    }

    pub fn is_seasonal(&self) -> bool {
        self.period > 0 && self.seasonal_p + self.seasonal_d + self.seasonal_q > 0
    }

    /// Estimated AR and MA coefficients
    pub fn param_count(&self) -> usize {
        self.p + self.q + self.seasonal_terms(self.seasonal_p) + self.seasonal_terms(self.seasonal_q)
    }

    fn seasonal_terms(&self, order: usize) -> usize {
        if self.period > 0 {
            order
        } else {
            0
        }
    }

    /// Observations consumed by differencing
    fn differencing_span(&self) -> usize {
        self.d + self.seasonal_terms(self.seasonal_d) * self.period
    }

    fn ar_span(&self) -> usize {
        self.p + self.seasonal_terms(self.seasonal_p) * self.period
    }

    /// Shortest series this order can be estimated on
    pub fn min_observations(&self) -> usize {
        self.differencing_span() + self.ar_span() + self.param_count() + 3
    }

    fn includes_mean(&self) -> bool {
        self.differencing_span() == 0
    }

    fn differencing_polynomial(&self) -> LagPolynomial {
        LagPolynomial::differencing(self.d, self.seasonal_terms(self.seasonal_d), self.period)
    }
}

impl fmt::Display for ArimaOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_seasonal() {
            write!(
                f,
                "SARIMA({},{},{})({},{},{})[{}]",
                self.p,
                self.d,
                self.q,
                self.seasonal_p,
                self.seasonal_d,
                self.seasonal_q,
                self.period
            )
        } else {
            write!(f, "ARIMA({},{},{})", self.p, self.d, self.q)
        }
    }
}

/// How the order is chosen among the candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionCriterion {
    /// Lowest Akaike information criterion on the full series
    #[default]
    Aic,
    /// Lowest absolute error forecasting the last month from the rest
    Holdout,
}

/// Coefficients of one fitted order
#[derive(Debug, Clone, PartialEq, Serialize)]
struct Coefficients {
    ar: Vec<f64>,
    ma: Vec<f64>,
    seasonal_ar: Vec<f64>,
    seasonal_ma: Vec<f64>,
}

impl Coefficients {
    fn split(order: &ArimaOrder, params: &[f64]) -> Self {
        let sp = order.seasonal_terms(order.seasonal_p);
        let sq = order.seasonal_terms(order.seasonal_q);
        let (ar, rest) = params.split_at(order.p);
        let (ma, rest) = rest.split_at(order.q);
        let (seasonal_ar, rest) = rest.split_at(sp);
        let seasonal_ma = &rest[..sq];
        Self {
            ar: ar.to_vec(),
            ma: ma.to_vec(),
            seasonal_ar: seasonal_ar.to_vec(),
            seasonal_ma: seasonal_ma.to_vec(),
        }
    }

    /// `phi(B) Phi(B^s)`
    fn ar_polynomial(&self, period: usize) -> LagPolynomial {
        LagPolynomial::autoregressive(&self.ar, 1)
            .multiply(&LagPolynomial::autoregressive(&self.seasonal_ar, period))
    }

    /// `theta(B) Theta(B^s)`
    fn ma_polynomial(&self, period: usize) -> LagPolynomial {
        LagPolynomial::moving_average(&self.ma, 1)
            .multiply(&LagPolynomial::moving_average(&self.seasonal_ma, period))
    }
}

/// One-step residuals of `ar(B) w_t = ma(B) e_t`, with pre-sample residuals at zero
///
/// Returns the sum of squares over the residuals after the AR warm-up and
/// the full residual vector (zeros during the warm-up).
fn conditional_residuals(w: &[f64], ar: &LagPolynomial, ma: &LagPolynomial) -> (f64, Vec<f64>) {
    let phi = ar.recursion_weights();
    let start = phi.len();
    let mut residuals = vec![0.0; w.len()];
    let mut css = 0.0;

    for t in start..w.len() {
        let mut predicted = 0.0;
        for (i, weight) in phi.iter().enumerate() {
            predicted += weight * w[t - i - 1];
        }
        for j in 1..=ma.degree().min(t) {
            predicted += ma.coefficient(j) * residuals[t - j];
        }
        let e = w[t] - predicted;
        residuals[t] = e;
        css += e * e;
    }

    (css, residuals)
}

/// A single (seasonal) ARIMA order
#[derive(Debug, Clone)]
pub struct Arima {
    order: ArimaOrder,
    optimizer: NelderMeadConfig,
}

impl Arima {
    pub fn new(order: ArimaOrder) -> Self {
        Self {
            order,
            optimizer: NelderMeadConfig::default(),
        }
    }

    pub fn with_optimizer(mut self, optimizer: NelderMeadConfig) -> Self {
        self.optimizer = optimizer;
        self
    }

    pub fn order(&self) -> &ArimaOrder {
        &self.order
    }

    fn fit_values(
        &self,
        airport: &str,
        values: &[f64],
        last_observed: YearMonth,
    ) -> Result<TrainedArima> {
        let order = self.order;
        let needed = order.min_observations();
        if values.len() < needed {
            return Err(ForecastError::InsufficientHistory {
                airport: airport.to_string(),
                needed,
                got: values.len(),
            });
        }

        let mut w = difference(values, 1, order.d);
        if order.period > 0 {
            w = difference(&w, order.period, order.seasonal_d);
        }
        let level = if order.includes_mean() {
            mean(&w).unwrap_or(0.0)
        } else {
            0.0
        };
        let centered: Vec<f64> = w.iter().map(|v| v - level).collect();

        let k = order.param_count();
        let objective = |params: &[f64]| {
            let coefficients = Coefficients::split(&order, params);
            let (css, _) = conditional_residuals(
                &centered,
                &coefficients.ar_polynomial(order.period),
                &coefficients.ma_polynomial(order.period),
            );
            if css.is_finite() {
                css
            } else {
                PENALTY
            }
        };
        let bounds = vec![(-COEFFICIENT_BOUND, COEFFICIENT_BOUND); k];
        let result = nelder_mead(objective, &vec![0.0; k], Some(&bounds), &self.optimizer);

        let coefficients = Coefficients::split(&order, &result.optimal_point);
        let (css, residuals) = conditional_residuals(
            &centered,
            &coefficients.ar_polynomial(order.period),
            &coefficients.ma_polynomial(order.period),
        );

        let effective = centered.len().saturating_sub(order.ar_span());
        if !css.is_finite() || effective == 0 {
            return Err(ForecastError::model_fit(
                airport,
                order.to_string(),
                "conditional sum of squares did not converge to a finite value",
            ));
        }

        let sigma2 = css / effective as f64;
        let estimated = k + usize::from(order.includes_mean()) + 1;
        let aic = effective as f64 * sigma2.max(f64::MIN_POSITIVE).ln() + 2.0 * estimated as f64;

        debug!(
            airport,
            order = %order,
            sigma2,
            aic,
            iterations = result.iterations,
            "arima fitted"
        );

        // Align residuals with the original series; differenced-away points get zero
        let mut aligned = vec![0.0; values.len() - residuals.len()];
        aligned.extend(residuals);

        Ok(TrainedArima {
            airport: airport.to_string(),
            name: order.to_string(),
            order,
            coefficients,
            mean: level,
            sigma2,
            aic,
            effective,
            estimated,
            history: values.to_vec(),
            residuals: aligned,
            last_observed,
        })
    }
}

impl ForecastModel for Arima {
    type Trained = TrainedArima;

    fn train(&self, series: &AirportSeries) -> Result<TrainedArima> {
        let last_observed = series.last_month().ok_or_else(|| {
            ForecastError::InsufficientHistory {
                airport: series.airport().to_string(),
                needed: self.order.min_observations(),
                got: 0,
            }
        })?;
        self.fit_values(series.airport(), &series.delays(), last_observed)
    }

    fn name(&self) -> &str {
        "arima"
    }
}

/// Fitted (seasonal) ARIMA model
#[derive(Debug, Clone, Serialize)]
pub struct TrainedArima {
    airport: String,
    name: String,
    order: ArimaOrder,
    coefficients: Coefficients,
    /// Series mean, for models without differencing
    mean: f64,
    /// Residual variance
    sigma2: f64,
    aic: f64,
    /// Residuals behind the conditional sum of squares
    effective: usize,
    /// Coefficients, mean and variance counted by the AIC penalty
    estimated: usize,
    history: Vec<f64>,
    residuals: Vec<f64>,
    last_observed: YearMonth,
}

impl TrainedArima {
    pub fn order(&self) -> &ArimaOrder {
        &self.order
    }

    pub fn aic(&self) -> f64 {
        self.aic
    }

    pub fn sigma2(&self) -> f64 {
        self.sigma2
    }

    pub fn effective_observations(&self) -> usize {
        self.effective
    }

    /// AIC from the last `n` conditional residuals only, so orders with
    /// different differencing and AR spans are scored on the same months
    pub fn aic_over(&self, n: usize) -> f64 {
        let n = n.clamp(1, self.effective.max(1));
        let tail = &self.residuals[self.residuals.len() - n..];
        let sigma2 = tail.iter().map(|e| e * e).sum::<f64>() / n as f64;
        n as f64 * sigma2.max(f64::MIN_POSITIVE).ln() + 2.0 * self.estimated as f64
    }

    pub fn ar(&self) -> &[f64] {
        &self.coefficients.ar
    }

    pub fn ma(&self) -> &[f64] {
        &self.coefficients.ma
    }

    /// `phi(B) Phi(B^s) (1-B)^d (1-B^s)^D`
    fn expanded_ar(&self) -> LagPolynomial {
        self.coefficients
            .ar_polynomial(self.order.period)
            .multiply(&self.order.differencing_polynomial())
    }
}

impl TrainedForecastModel for TrainedArima {
    fn forecast(&self, horizons: usize) -> Result<ModelForecast> {
        let ar = self.expanded_ar();
        let ma = self.coefficients.ma_polynomial(self.order.period);
        let pi = ar.recursion_weights();

        let mut levels: Vec<f64> = self.history.iter().map(|v| v - self.mean).collect();
        let mut residuals = self.residuals.clone();
        let mut values = Vec::with_capacity(horizons);

        for _ in 0..horizons {
            let t = levels.len();
            let mut predicted = 0.0;
            for (i, weight) in pi.iter().enumerate().take(t) {
                predicted += weight * levels[t - i - 1];
            }
            for j in 1..=ma.degree().min(t) {
                predicted += ma.coefficient(j) * residuals[t - j];
            }
            // Future shocks have zero expectation
            levels.push(predicted);
            residuals.push(0.0);
            values.push(predicted + self.mean);
        }

        if values.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::model_fit(
                self.airport.clone(),
                self.name.clone(),
                "forecast is not finite",
            ));
        }

        let z = normal_critical_value(INTERVAL_LEVEL)?;
        let psi = psi_weights(&ar, &ma, horizons);
        let mut cumulative = 0.0;
        let intervals = values
            .iter()
            .zip(psi.iter())
            .map(|(value, weight)| {
                cumulative += weight * weight;
                let margin = z * (self.sigma2 * cumulative).sqrt();
                (value - margin, value + margin)
            })
            .collect();

        ModelForecast::new_with_intervals(values, intervals)
    }

    fn last_observed(&self) -> YearMonth {
        self.last_observed
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Picks the best order per airport among configured candidates
#[derive(Debug, Clone)]
pub struct ArimaSelector {
    candidates: Vec<ArimaOrder>,
    criterion: SelectionCriterion,
    optimizer: NelderMeadConfig,
}

impl ArimaSelector {
    pub fn new(candidates: Vec<ArimaOrder>, criterion: SelectionCriterion) -> Result<Self> {
        if candidates.is_empty() {
            return Err(ForecastError::InvalidParameter(
                "ARIMA search needs at least one candidate order".to_string(),
            ));
        }
        Ok(Self {
            candidates,
            criterion,
            optimizer: NelderMeadConfig::default(),
        })
    }

    pub fn from_config(config: &ArimaConfig) -> Result<Self> {
        Ok(Self::new(config.candidates.clone(), config.selection)?
            .with_optimizer(config.optimizer.clone()))
    }

    pub fn with_optimizer(mut self, optimizer: NelderMeadConfig) -> Self {
        self.optimizer = optimizer;
        self
    }

    pub fn candidates(&self) -> &[ArimaOrder] {
        &self.candidates
    }

    fn model(&self, order: ArimaOrder) -> Arima {
        Arima::new(order).with_optimizer(self.optimizer.clone())
    }

    /// Score every candidate; lower is better. Failed candidates are dropped.
    fn score_candidates(
        &self,
        airport: &str,
        values: &[f64],
        last_observed: YearMonth,
        failures: &mut Vec<String>,
    ) -> Vec<(ArimaOrder, f64)> {
        let scores: Vec<(ArimaOrder, Result<f64>)> = match self.criterion {
            SelectionCriterion::Aic => {
                let mut fitted = Vec::new();
                for &order in &self.candidates {
                    match self.model(order).fit_values(airport, values, last_observed) {
                        Ok(model) => fitted.push(model),
                        Err(e) => failures.push(format!("{}: {}", order, e)),
                    }
                }
                // Months every fitted order conditions on
                let common = fitted
                    .iter()
                    .map(TrainedArima::effective_observations)
                    .min()
                    .unwrap_or(0);
                fitted
                    .iter()
                    .map(|model| (model.order, Ok(model.aic_over(common))))
                    .collect()
            }
            SelectionCriterion::Holdout => self
                .candidates
                .iter()
                .map(|&order| (order, self.holdout_error(airport, order, values, last_observed)))
                .collect(),
        };

        let mut scored = Vec::new();
        for (order, score) in scores {
            match score {
                Ok(s) if s.is_finite() => scored.push((order, s)),
                Ok(_) => failures.push(format!("{}: non-finite score", order)),
                Err(e) => failures.push(format!("{}: {}", order, e)),
            }
        }
        scored
    }

    /// One-step error on the last month after fitting the months before it
    fn holdout_error(
        &self,
        airport: &str,
        order: ArimaOrder,
        values: &[f64],
        last_observed: YearMonth,
    ) -> Result<f64> {
        let (train, held_out) = values.split_at(values.len().saturating_sub(1));
        let actual = held_out.first().ok_or_else(|| ForecastError::InsufficientHistory {
            airport: airport.to_string(),
            needed: 2,
            got: values.len(),
        })?;
        let forecast = self
            .model(order)
            .fit_values(airport, train, last_observed.plus(-1))?
            .forecast(1)?;
        forecast
            .at(1)
            .map(|p| (p - actual).abs())
            .ok_or_else(|| ForecastError::model_fit(airport, order.to_string(), "empty forecast"))
    }
}

impl ForecastModel for ArimaSelector {
    type Trained = TrainedArima;

    fn train(&self, series: &AirportSeries) -> Result<TrainedArima> {
        let airport = series.airport();
        let values = series.delays();
        let last_observed = series.last_month().ok_or_else(|| {
            ForecastError::InsufficientHistory {
                airport: airport.to_string(),
                needed: 1,
                got: 0,
            }
        })?;

        let mut failures = Vec::new();
        let scored = self.score_candidates(airport, &values, last_observed, &mut failures);

        // First candidate wins ties
        let best = scored
            .iter()
            .fold(None::<&(ArimaOrder, f64)>, |best, candidate| match best {
                Some(b) if b.1 <= candidate.1 => Some(b),
                _ => Some(candidate),
            })
            .map(|(order, _)| *order)
            .ok_or_else(|| {
                ForecastError::model_fit(airport, "arima", format!("no candidate fitted ({})", failures.join("; ")))
            })?;

        debug!(airport, order = %best, criterion = ?self.criterion, "arima order selected");
        self.model(best).fit_values(airport, &values, last_observed)
    }

    fn name(&self) -> &str {
        "arima"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic_series;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};

    fn start() -> YearMonth {
        YearMonth::new(2020, 1).unwrap()
    }

    fn ar1_series(phi: f64, n: usize, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let noise = Normal::new(0.0, 1.0).unwrap();
        let mut x = 0.0;
        (0..n)
            .map(|_| {
                x = phi * x + noise.sample(&mut rng);
                20.0 + x
            })
            .collect()
    }

    #[test]
    fn test_order_display_and_sizes() {
        let plain = ArimaOrder::new(1, 1, 1);
        assert_eq!(plain.to_string(), "ARIMA(1,1,1)");
        assert_eq!(plain.param_count(), 2);
        assert!(!plain.is_seasonal());

        let seasonal = ArimaOrder::seasonal(1, 1, 0, 1, 0, 0, 12);
        assert_eq!(seasonal.to_string(), "SARIMA(1,1,0)(1,0,0)[12]");
        assert_eq!(seasonal.param_count(), 2);
        assert_eq!(seasonal.min_observations(), 1 + 13 + 2 + 3);
    }

    #[test]
    fn test_order_deserializes_without_seasonal_fields() {
        let order: ArimaOrder = serde_json::from_str(r#"{"p":2,"d":1,"q":0}"#).unwrap();
        assert_eq!(order, ArimaOrder::new(2, 1, 0));
    }

    #[test]
    fn test_conditional_residuals_of_known_ar() {
        let ar = LagPolynomial::autoregressive(&[0.5], 1);
        let (css, residuals) =
            conditional_residuals(&[2.0, 1.0, 1.5], &ar, &LagPolynomial::one());
        assert_eq!(residuals, vec![0.0, 0.0, 1.0]);
        assert_relative_eq!(css, 1.0);
    }

    #[test]
    fn test_random_walk_forecast_is_last_value() {
        let series = synthetic_series("LUTON", start(), &[10.0, 12.0, 11.0, 13.0, 12.5, 14.0]);
        let trained = Arima::new(ArimaOrder::new(0, 1, 0)).train(&series).unwrap();
        let forecast = trained.forecast(3).unwrap();

        for value in forecast.values() {
            assert_relative_eq!(*value, 14.0, epsilon = 1e-12);
        }
        let widths: Vec<f64> = forecast
            .intervals()
            .unwrap()
            .iter()
            .map(|(lo, hi)| hi - lo)
            .collect();
        assert_relative_eq!(widths[1] / widths[0], 2.0_f64.sqrt(), epsilon = 1e-9);
    }

    #[test]
    fn test_ar1_coefficient_recovered() {
        let values = ar1_series(0.6, 240, 7);
        let series = synthetic_series("LUTON", start(), &values);
        let trained = Arima::new(ArimaOrder::new(1, 0, 0)).train(&series).unwrap();

        assert_relative_eq!(trained.ar()[0], 0.6, epsilon = 0.12);

        let forecast = trained.forecast(3).unwrap();
        let last = values[values.len() - 1];
        // Forecasts decay from the last value towards the mean
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let first_gap = (forecast.values()[0] - mean).abs();
        let third_gap = (forecast.values()[2] - mean).abs();
        assert!(third_gap <= first_gap + 1e-9);
        assert!((forecast.values()[0] - mean).abs() <= (last - mean).abs() + 1e-9);
    }

    #[test]
    fn test_short_series_is_insufficient_history() {
        let series = synthetic_series("LUTON", start(), &[1.0, 2.0, 3.0]);
        let result = Arima::new(ArimaOrder::new(1, 1, 1)).train(&series);
        assert!(matches!(
            result,
            Err(ForecastError::InsufficientHistory { needed: 7, got: 3, .. })
        ));
    }

    #[test]
    fn test_selector_skips_unfittable_candidates() {
        let values = ar1_series(0.5, 16, 3);
        let series = synthetic_series("LUTON", start(), &values);
        let selector = ArimaSelector::new(
            vec![
                ArimaOrder::seasonal(1, 1, 0, 1, 0, 0, 12),
                ArimaOrder::new(1, 0, 0),
            ],
            SelectionCriterion::Aic,
        )
        .unwrap();

        let trained = selector.train(&series).unwrap();
        assert_eq!(*trained.order(), ArimaOrder::new(1, 0, 0));
        assert_eq!(trained.last_observed(), start().plus(15));
    }

    #[test]
    fn test_aic_compared_over_common_months() {
        let values = ar1_series(0.5, 48, 5);
        let series = synthetic_series("LUTON", start(), &values);
        let level = Arima::new(ArimaOrder::new(1, 0, 0)).train(&series).unwrap();
        let seasonal = Arima::new(ArimaOrder::seasonal(1, 1, 0, 1, 0, 0, 12))
            .train(&series)
            .unwrap();

        assert_eq!(level.effective_observations(), 47);
        assert_eq!(seasonal.effective_observations(), 48 - 1 - 13);
        assert_relative_eq!(level.aic_over(47), level.aic(), epsilon = 1e-9);

        // the longer model is scored on its last 34 residuals only
        let common = seasonal.effective_observations();
        let tail = &level.residuals[48 - common..];
        let sigma2 = tail.iter().map(|e| e * e).sum::<f64>() / common as f64;
        assert_relative_eq!(
            level.aic_over(common),
            common as f64 * sigma2.ln() + 2.0 * 3.0,
            epsilon = 1e-9
        );
        assert!(level.aic_over(common) != level.aic());
    }

    #[test]
    fn test_holdout_selection_refits_on_full_series() {
        let values = ar1_series(0.3, 30, 11);
        let series = synthetic_series("LUTON", start(), &values);
        let selector = ArimaSelector::new(
            vec![ArimaOrder::new(0, 1, 1), ArimaOrder::new(1, 0, 0)],
            SelectionCriterion::Holdout,
        )
        .unwrap();

        let trained = selector.train(&series).unwrap();
        assert_eq!(trained.last_observed(), start().plus(29));
        assert_eq!(trained.forecast(3).unwrap().horizons(), 3);
    }

    #[test]
    fn test_selector_without_fittable_candidate_fails() {
        let series = synthetic_series("LUTON", start(), &[1.0, 2.0]);
        let selector =
            ArimaSelector::new(vec![ArimaOrder::new(1, 1, 1)], SelectionCriterion::Aic).unwrap();
        assert!(matches!(
            selector.train(&series),
            Err(ForecastError::ModelFit { .. })
        ));
        assert!(ArimaSelector::new(Vec::new(), SelectionCriterion::Aic).is_err());
    }
}
