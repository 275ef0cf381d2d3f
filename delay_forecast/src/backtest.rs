//! Rolling-origin backtesting
//!
//! For each origin month, every airport is fitted on its months strictly
//! before the origin and its 1..3 month forecasts are compared with what was
//! later observed.

use crate::data::{write_csv, AirportSeries, CleanedDataset};
use crate::error::{ForecastError, Result};
use crate::filter::{ExcludedAirport, ExclusionReason};
use crate::models::{ModelKind, Trainer, TrainedForecastModel};
use crate::month::YearMonth;
use crate::report::{SkipRecord, Stage};
use crate::MAX_HORIZON;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, info};

/// One training window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fold {
    pub origin: YearMonth,
    /// Latest month the model saw
    pub train_end: YearMonth,
}

impl Fold {
    /// A fold is only valid when training ends before the origin
    pub fn new(origin: YearMonth, train_end: YearMonth) -> Result<Self> {
        if train_end >= origin {
            return Err(ForecastError::ValidationError(format!(
                "Training window ending {} overlaps origin {}",
                train_end, origin
            )));
        }
        Ok(Self { origin, train_end })
    }
}

/// A forecast compared against the observed value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldPrediction {
    pub airport: String,
    pub model: ModelKind,
    pub origin: YearMonth,
    pub train_end: YearMonth,
    pub horizon: u32,
    pub target_month: YearMonth,
    pub predicted: f64,
    pub actual: f64,
}

impl FoldPrediction {
    pub fn absolute_error(&self) -> f64 {
        (self.predicted - self.actual).abs()
    }
}

/// Everything a backtest produced
#[derive(Debug, Clone, Default)]
pub struct BacktestOutcome {
    pub origins: Vec<YearMonth>,
    pub predictions: Vec<FoldPrediction>,
    pub excluded: Vec<ExcludedAirport>,
    pub skipped: Vec<SkipRecord>,
}

impl BacktestOutcome {
    pub fn save(&self, predictions_path: &Path, exclusions_path: &Path) -> Result<()> {
        write_csv(predictions_path, &self.predictions)?;
        write_csv(exclusions_path, &self.excluded)
    }
}

/// Rolling-origin evaluator
#[derive(Debug, Clone)]
pub struct Backtester {
    min_train_months: usize,
    max_origins: Option<usize>,
    horizons: u32,
}

impl Default for Backtester {
    fn default() -> Self {
        Self::new(9, Some(12))
    }
}

impl Backtester {
    pub fn new(min_train_months: usize, max_origins: Option<usize>) -> Self {
        Self {
            min_train_months: min_train_months.max(1),
            max_origins,
            horizons: MAX_HORIZON,
        }
    }

    /// Origins where at least one airport has enough history and an actual
    pub fn origins(&self, series: &BTreeMap<String, AirportSeries>) -> Vec<YearMonth> {
        let mut origins = BTreeSet::new();
        for s in series.values() {
            for record in s.records().iter().skip(self.min_train_months) {
                if s.before(record.period).len() >= self.min_train_months {
                    origins.insert(record.period);
                }
            }
        }

        let origins: Vec<YearMonth> = origins.into_iter().collect();
        match self.max_origins {
            Some(limit) if origins.len() > limit => origins[origins.len() - limit..].to_vec(),
            _ => origins,
        }
    }

    pub fn run(&self, dataset: &CleanedDataset, trainers: &[Trainer]) -> Result<BacktestOutcome> {
        let series = dataset.all_series();
        let origins = self.origins(&series);
        let mut outcome = BacktestOutcome {
            origins: origins.clone(),
            ..Default::default()
        };

        for &origin in &origins {
            let windows: BTreeMap<String, AirportSeries> = series
                .iter()
                .filter(|(_, s)| s.get(origin).is_some())
                .map(|(airport, s)| (airport.clone(), s.before(origin)))
                .filter(|(_, window)| window.len() >= self.min_train_months)
                .collect();
            if windows.is_empty() {
                continue;
            }
            debug!(%origin, airports = windows.len(), "backtest origin");

            for trainer in trainers {
                let fitted = trainer.fit_all(&windows, Stage::Backtest);
                outcome.skipped.extend(fitted.skipped.into_iter().map(|mut skip| {
                    skip.subject = format!("{} @ {}", skip.subject, origin);
                    skip
                }));

                for (airport, model) in &fitted.models {
                    let fold = Fold::new(origin, model.last_observed())?;
                    let actual_series = &series[airport];
                    let forecast = match model.forecast(self.horizons as usize) {
                        Ok(f) => f,
                        Err(e) => {
                            outcome.skipped.push(
                                SkipRecord::new(Stage::Backtest, format!("{} @ {}", airport, origin), e)
                                    .with_model(trainer.kind()),
                            );
                            continue;
                        }
                    };

                    for horizon in 1..=self.horizons {
                        let target_month = fold.train_end.plus(horizon as i32);
                        let (Some(predicted), Some(actual)) = (
                            forecast.at(horizon as usize),
                            actual_series.get(target_month),
                        ) else {
                            continue;
                        };
                        outcome.predictions.push(FoldPrediction {
                            airport: airport.clone(),
                            model: trainer.kind(),
                            origin: fold.origin,
                            train_end: fold.train_end,
                            horizon,
                            target_month,
                            predicted,
                            actual: actual.avg_delay,
                        });
                    }
                }
            }
        }

        let evaluated: BTreeSet<&str> = outcome
            .predictions
            .iter()
            .map(|p| p.airport.as_str())
            .collect();
        for (airport, s) in &series {
            if !evaluated.contains(airport.as_str()) {
                outcome.excluded.push(ExcludedAirport {
                    airport: airport.clone(),
                    reason: ExclusionReason::NoEvaluableFold,
                    months_available: s.len(),
                    detail: format!(
                        "needs more than {} months before an evaluated origin",
                        self.min_train_months
                    ),
                });
            }
        }

        info!(
            origins = origins.len(),
            predictions = outcome.predictions.len(),
            excluded = outcome.excluded.len(),
            skipped = outcome.skipped.len(),
            "backtest complete"
        );
        Ok(outcome)
    }
}
