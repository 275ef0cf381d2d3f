//! Forecasting models for monthly airport delay series

use crate::data::AirportSeries;
use crate::error::{ForecastError, Result};
use crate::month::YearMonth;
use crate::report::{SkipRecord, Stage};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Debug};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

pub mod arima;
pub mod baseline;
pub mod gradient_boosting;
pub mod tree;

use arima::{ArimaSelector, TrainedArima};
use baseline::{NaiveBaseline, TrainedBaseline};
use gradient_boosting::{Booster, GradientBoostingTrainer, TrainedBooster};

/// The model families, in tie-break order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Baseline,
    Arima,
    GradientBoosting,
}

impl ModelKind {
    pub const ALL: [ModelKind; 3] = [
        ModelKind::Baseline,
        ModelKind::Arima,
        ModelKind::GradientBoosting,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Baseline => "baseline",
            ModelKind::Arima => "arima",
            ModelKind::GradientBoosting => "gradient_boosting",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "baseline" | "naive" => Ok(ModelKind::Baseline),
            "arima" | "sarima" => Ok(ModelKind::Arima),
            "gradient_boosting" | "gbt" | "xgb" => Ok(ModelKind::GradientBoosting),
            other => Err(ForecastError::InvalidParameter(format!(
                "Unknown model kind: {}",
                other
            ))),
        }
    }
}

/// Point forecasts for horizons `1..=n`, with optional 95% intervals
#[derive(Debug, Clone, PartialEq)]
pub struct ModelForecast {
    values: Vec<f64>,
    intervals: Option<Vec<(f64, f64)>>,
}

impl ModelForecast {
    pub fn new(values: Vec<f64>) -> Self {
        Self {
            values,
            intervals: None,
        }
    }

    pub fn new_with_intervals(values: Vec<f64>, intervals: Vec<(f64, f64)>) -> Result<Self> {
        if values.len() != intervals.len() {
            return Err(ForecastError::ValidationError(format!(
                "Values length ({}) doesn't match intervals length ({})",
                values.len(),
                intervals.len()
            )));
        }
        Ok(Self {
            values,
            intervals: Some(intervals),
        })
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn intervals(&self) -> Option<&[(f64, f64)]> {
        self.intervals.as_deref()
    }

    pub fn horizons(&self) -> usize {
        self.values.len()
    }

    /// Forecast `horizon` steps ahead (1-based)
    pub fn at(&self, horizon: usize) -> Option<f64> {
        horizon.checked_sub(1).and_then(|i| self.values.get(i).copied())
    }

    pub fn interval_at(&self, horizon: usize) -> Option<(f64, f64)> {
        let i = horizon.checked_sub(1)?;
        self.intervals.as_ref().and_then(|iv| iv.get(i).copied())
    }
}

/// A model fitted to one airport
pub trait TrainedForecastModel: Debug {
    /// Forecast the months after the last observed one
    fn forecast(&self, horizons: usize) -> Result<ModelForecast>;

    /// Last month of the series the model was fitted on
    fn last_observed(&self) -> YearMonth;

    fn name(&self) -> &str;
}

/// A model that can be fitted to one airport series
pub trait ForecastModel: Debug + Clone {
    type Trained: TrainedForecastModel;

    fn train(&self, series: &AirportSeries) -> Result<Self::Trained>;

    fn name(&self) -> &str;
}

/// A fitted model of any kind
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FittedModel {
    Baseline(TrainedBaseline),
    Arima(TrainedArima),
    GradientBoosting(TrainedBooster),
}

impl FittedModel {
    pub fn kind(&self) -> ModelKind {
        match self {
            FittedModel::Baseline(_) => ModelKind::Baseline,
            FittedModel::Arima(_) => ModelKind::Arima,
            FittedModel::GradientBoosting(_) => ModelKind::GradientBoosting,
        }
    }

    fn inner(&self) -> &dyn TrainedForecastModel {
        match self {
            FittedModel::Baseline(m) => m,
            FittedModel::Arima(m) => m,
            FittedModel::GradientBoosting(m) => m,
        }
    }
}

impl TrainedForecastModel for FittedModel {
    fn forecast(&self, horizons: usize) -> Result<ModelForecast> {
        self.inner().forecast(horizons)
    }

    fn last_observed(&self) -> YearMonth {
        self.inner().last_observed()
    }

    fn name(&self) -> &str {
        self.inner().name()
    }
}

/// Models fitted for every airport a trainer could handle
#[derive(Debug, Clone)]
pub struct FitOutcome {
    pub kind: ModelKind,
    pub models: BTreeMap<String, FittedModel>,
    pub skipped: Vec<SkipRecord>,
    /// The pooled ensemble, for tree models
    pub booster: Option<Arc<Booster>>,
}

/// One configured model family
#[derive(Debug, Clone)]
pub enum Trainer {
    Baseline(NaiveBaseline),
    Arima(ArimaSelector),
    GradientBoosting(GradientBoostingTrainer),
}

impl Trainer {
    pub fn kind(&self) -> ModelKind {
        match self {
            Trainer::Baseline(_) => ModelKind::Baseline,
            Trainer::Arima(_) => ModelKind::Arima,
            Trainer::GradientBoosting(_) => ModelKind::GradientBoosting,
        }
    }

    /// Fit every airport; per-airport failures become skips attributed to `stage`
    pub fn fit_all(&self, series: &BTreeMap<String, AirportSeries>, stage: Stage) -> FitOutcome {
        let kind = self.kind();
        let units: Vec<&AirportSeries> = series.values().collect();

        let (results, booster): (Vec<(String, Result<FittedModel>)>, Option<Arc<Booster>>) =
            match self {
                Trainer::Baseline(model) => (fit_each(model, &units, FittedModel::Baseline), None),
                Trainer::Arima(model) => (fit_each(model, &units, FittedModel::Arima), None),
                Trainer::GradientBoosting(trainer) => match trainer.fit_pooled(&units) {
                    Ok(booster) => {
                        let booster = Arc::new(booster);
                        let results = units
                            .iter()
                            .map(|s| {
                                let fitted = TrainedBooster::new(Arc::clone(&booster), s)
                                    .map(FittedModel::GradientBoosting);
                                (s.airport().to_string(), fitted)
                            })
                            .collect();
                        (results, Some(booster))
                    }
                    Err(e) => {
                        // Without an ensemble every airport is skipped
                        let reason = e.to_string();
                        let results = units
                            .iter()
                            .map(|s| {
                                let err = ForecastError::model_fit(s.airport(), kind.as_str(), &reason);
                                (s.airport().to_string(), Err(err))
                            })
                            .collect();
                        (results, None)
                    }
                },
            };

        let mut models = BTreeMap::new();
        let mut skipped = Vec::new();
        for (airport, result) in results {
            match result {
                Ok(model) => {
                    debug!(airport = %airport, model = %kind, name = model.name(), "fitted");
                    models.insert(airport, model);
                }
                Err(e) => {
                    skipped.push(SkipRecord::new(stage, airport, e).with_model(kind));
                }
            }
        }

        info!(model = %kind, fitted = models.len(), skipped = skipped.len(), "fit complete");
        FitOutcome {
            kind,
            models,
            skipped,
            booster,
        }
    }
}

/// Fit a per-airport model in parallel, keeping input order
fn fit_each<M>(
    model: &M,
    units: &[&AirportSeries],
    wrap: fn(M::Trained) -> FittedModel,
) -> Vec<(String, Result<FittedModel>)>
where
    M: ForecastModel + Sync,
    M::Trained: Send,
{
    units
        .par_iter()
        .map(|series| {
            let fitted = model.train(series).map(wrap).map_err(|e| match e {
                ForecastError::ModelFit { .. } => e,
                other => ForecastError::model_fit(series.airport(), model.name(), other.to_string()),
            });
            (series.airport().to_string(), fitted)
        })
        .collect()
}
