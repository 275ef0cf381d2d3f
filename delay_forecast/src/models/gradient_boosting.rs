//! Gradient-boosted regression trees pooled across airports
//!
//! One ensemble is fitted on every airport-month with complete lag features.
//! Forecasting an airport is recursive: each predicted month becomes the
//! lag-1 delay of the next step.

use crate::config::GradientBoostingConfig;
use crate::data::{AirportSeries, CleanedRecord};
use crate::error::{ForecastError, Result};
use crate::models::tree::{RegressionTree, TreeParams};
use crate::models::{ModelForecast, TrainedForecastModel};
use crate::month::YearMonth;
use delay_math::stats::mean;
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Predictor columns, in feature-vector order
pub const FEATURE_NAMES: [&str; 9] = [
    "month",
    "time_index",
    "avg_delay_lag_1",
    "avg_delay_lag_2",
    "avg_delay_lag_3",
    "ontime_pct_lag_1",
    "ontime_pct_lag_3",
    "cancelled_pct_lag_1",
    "cancelled_pct_lag_3",
];

/// Fewest complete rows worth boosting on
const MIN_TRAINING_ROWS: usize = 10;

/// Months of history the recursive state keeps
const STATE_MONTHS: usize = 3;

/// Feature vector of a cleaned record, or `None` while any lag is missing
pub fn feature_row(record: &CleanedRecord) -> Option<Vec<f64>> {
    Some(vec![
        record.month as f64,
        record.time_index as f64,
        record.avg_delay_lag_1?,
        record.avg_delay_lag_2?,
        record.avg_delay_lag_3?,
        record.ontime_pct_lag_1?,
        record.ontime_pct_lag_3?,
        record.cancelled_pct_lag_1?,
        record.cancelled_pct_lag_3?,
    ])
}

/// Fitted ensemble
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booster {
    base_score: f64,
    learning_rate: f64,
    trees: Vec<RegressionTree>,
    feature_names: Vec<String>,
    training_rows: usize,
}

impl Booster {
    pub fn predict(&self, features: &[f64]) -> f64 {
        self.base_score
            + self.learning_rate * self.trees.iter().map(|t| t.predict(features)).sum::<f64>()
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    pub fn training_rows(&self) -> usize {
        self.training_rows
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string(self)?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }
}

/// Fits the pooled ensemble
#[derive(Debug, Clone)]
pub struct GradientBoostingTrainer {
    config: GradientBoostingConfig,
}

impl GradientBoostingTrainer {
    pub fn new(config: GradientBoostingConfig) -> Result<Self> {
        let fraction = |name: &str, value: f64| {
            if value > 0.0 && value <= 1.0 {
                Ok(())
            } else {
                Err(ForecastError::InvalidParameter(format!(
                    "{} must be in (0, 1], got {}",
                    name, value
                )))
            }
        };
        fraction("learning_rate", config.learning_rate)?;
        fraction("subsample", config.subsample)?;
        fraction("colsample", config.colsample)?;
        if config.n_estimators == 0 || config.max_depth == 0 {
            return Err(ForecastError::InvalidParameter(
                "n_estimators and max_depth must be positive".to_string(),
            ));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &GradientBoostingConfig {
        &self.config
    }

    /// Fit one ensemble on every complete row of the given airports
    pub fn fit_pooled(&self, series: &[&AirportSeries]) -> Result<Booster> {
        let (x, y): (Vec<Vec<f64>>, Vec<f64>) = series
            .iter()
            .flat_map(|s| s.records())
            .filter_map(|r| feature_row(r).map(|row| (row, r.avg_delay)))
            .unzip();

        if y.len() < MIN_TRAINING_ROWS {
            return Err(ForecastError::InsufficientHistory {
                airport: "pooled training set".to_string(),
                needed: MIN_TRAINING_ROWS,
                got: y.len(),
            });
        }

        let config = &self.config;
        let n = y.len();
        let feature_count = FEATURE_NAMES.len();
        let row_count = ((n as f64 * config.subsample).round() as usize).clamp(1, n);
        let column_count =
            ((feature_count as f64 * config.colsample).round() as usize).clamp(1, feature_count);
        let params = TreeParams {
            max_depth: config.max_depth,
            min_samples_leaf: config.min_samples_leaf,
        };

        let base_score = mean(&y).unwrap_or(0.0);
        let mut predictions = vec![base_score; n];
        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut trees = Vec::with_capacity(config.n_estimators);

        for _ in 0..config.n_estimators {
            let residuals: Vec<f64> = y.iter().zip(&predictions).map(|(t, p)| t - p).collect();

            let mut rows = sample(&mut rng, n, row_count).into_vec();
            rows.sort_unstable();
            let mut columns = sample(&mut rng, feature_count, column_count).into_vec();
            columns.sort_unstable();

            let tree = RegressionTree::fit(&x, &residuals, &rows, &columns, params);
            for (prediction, row) in predictions.iter_mut().zip(&x) {
                *prediction += config.learning_rate * tree.predict(row);
            }
            trees.push(tree);
        }

        let train_mae = y
            .iter()
            .zip(&predictions)
            .map(|(t, p)| (t - p).abs())
            .sum::<f64>()
            / n as f64;
        info!(
            rows = n,
            airports = series.len(),
            trees = trees.len(),
            train_mae,
            "gradient boosting ensemble fitted"
        );

        Ok(Booster {
            base_score,
            learning_rate: config.learning_rate,
            trees,
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            training_rows: n,
        })
    }
}

/// What the recursive forecast carries from one month to the next
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastState {
    /// Month the newest values belong to
    month: YearMonth,
    time_index: u32,
    /// Last three delays, oldest first; predictions replace observations as we go
    delays: Vec<f64>,
    ontime: Vec<f64>,
    cancelled: Vec<f64>,
    last_ontime: f64,
    last_cancelled: f64,
}

impl ForecastState {
    /// State after the last observed month; needs three consecutive months
    pub fn from_series(series: &AirportSeries) -> Result<Self> {
        let records = series.records();
        if records.len() < STATE_MONTHS {
            return Err(ForecastError::InsufficientHistory {
                airport: series.airport().to_string(),
                needed: STATE_MONTHS,
                got: records.len(),
            });
        }
        let tail = &records[records.len() - STATE_MONTHS..];
        if tail[0].period.months_until(tail[STATE_MONTHS - 1].period) != STATE_MONTHS as i32 - 1 {
            return Err(ForecastError::model_fit(
                series.airport(),
                "gradient_boosting",
                "last three months are not consecutive",
            ));
        }

        let last = &tail[STATE_MONTHS - 1];
        Ok(Self {
            month: last.period,
            time_index: last.time_index,
            delays: tail.iter().map(|r| r.avg_delay).collect(),
            ontime: tail.iter().map(|r| r.ontime_pct).collect(),
            cancelled: tail.iter().map(|r| r.cancelled_pct).collect(),
            last_ontime: last.ontime_pct,
            last_cancelled: last.cancelled_pct,
        })
    }

    /// Predictors for the month after `self.month`
    pub fn features(&self) -> Vec<f64> {
        let lag = |values: &[f64], k: usize| values[values.len() - k];
        vec![
            self.month.succ().month() as f64,
            (self.time_index + 1) as f64,
            lag(&self.delays, 1),
            lag(&self.delays, 2),
            lag(&self.delays, 3),
            lag(&self.ontime, 1),
            lag(&self.ontime, 3),
            lag(&self.cancelled, 1),
            lag(&self.cancelled, 3),
        ]
    }

    /// Move one month forward with `predicted` as that month's delay
    pub fn advance(&mut self, predicted: f64) {
        push_window(&mut self.delays, predicted);
        // Rates are not forecast; the last observation is carried forward
        push_window(&mut self.ontime, self.last_ontime);
        push_window(&mut self.cancelled, self.last_cancelled);
        self.month = self.month.succ();
        self.time_index += 1;
    }

    pub fn month(&self) -> YearMonth {
        self.month
    }
}

fn push_window(window: &mut Vec<f64>, value: f64) {
    window.push(value);
    if window.len() > STATE_MONTHS {
        window.remove(0);
    }
}

/// The pooled ensemble bound to one airport's recent history
#[derive(Debug, Clone, Serialize)]
pub struct TrainedBooster {
    airport: String,
    #[serde(skip)]
    booster: Arc<Booster>,
    state: ForecastState,
}

impl TrainedBooster {
    pub fn new(booster: Arc<Booster>, series: &AirportSeries) -> Result<Self> {
        Ok(Self {
            airport: series.airport().to_string(),
            state: ForecastState::from_series(series)?,
            booster,
        })
    }
}

impl TrainedForecastModel for TrainedBooster {
    fn forecast(&self, horizons: usize) -> Result<ModelForecast> {
        let mut state = self.state.clone();
        let mut values = Vec::with_capacity(horizons);

        for step in 1..=horizons {
            let features = state.features();
            let predicted = self.booster.predict(&features);
            if !predicted.is_finite() {
                return Err(ForecastError::model_fit(
                    self.airport.clone(),
                    "gradient_boosting",
                    format!("non-finite prediction at step {}", step),
                ));
            }
            debug!(airport = %self.airport, step, predicted, "recursive step");
            values.push(predicted);
            state.advance(predicted);
        }

        Ok(ModelForecast::new(values))
    }

    fn last_observed(&self) -> YearMonth {
        self.state.month
    }

    fn name(&self) -> &str {
        "gradient_boosting"
    }
}
