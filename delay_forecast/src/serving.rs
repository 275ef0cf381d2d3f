//! Query side: forecasts, airports and figures answered from persisted artifacts

use crate::config::PathsConfig;
use crate::data::{read_csv, write_csv, CleanedDataset};
use crate::error::{ForecastError, Result};
use crate::models::ModelKind;
use crate::month::YearMonth;
use crate::scores::load_best_models;
use crate::MAX_HORIZON;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Preferred model when no backtest score picked one
pub const FALLBACK_ORDER: [ModelKind; 3] = [
    ModelKind::Arima,
    ModelKind::GradientBoosting,
    ModelKind::Baseline,
];

/// One airport's forecast at one horizon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub airport: String,
    pub last_observed: YearMonth,
    pub forecast_month: YearMonth,
    pub horizon: u32,
    pub predicted_avg_delay: f64,
    pub lower_95: Option<f64>,
    pub upper_95: Option<f64>,
    pub model: ModelKind,
    /// Fitted order or variant, e.g. `ARIMA(1,1,1)`
    pub model_name: String,
}

impl ForecastResult {
    pub fn forecast_date(&self) -> NaiveDate {
        self.forecast_month.first_day()
    }

    pub fn last_observed_date(&self) -> NaiveDate {
        self.last_observed.first_day()
    }

    /// The query answer: first-of-month dates, minutes rounded to 2 decimals
    pub fn response(&self) -> ForecastResponse {
        ForecastResponse {
            airport: self.airport.clone(),
            last_observed_month: self.last_observed_date(),
            forecast_month: self.forecast_date(),
            horizon: self.horizon,
            predicted_avg_delay_minutes: round2(self.predicted_avg_delay),
            lower_95: self.lower_95.map(round2),
            upper_95: self.upper_95.map(round2),
            model_used: self.model_name.clone(),
            model_family: self.model,
        }
    }
}

/// Forecast query answer as returned to callers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastResponse {
    pub airport: String,
    pub last_observed_month: NaiveDate,
    pub forecast_month: NaiveDate,
    pub horizon: u32,
    pub predicted_avg_delay_minutes: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lower_95: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upper_95: Option<f64>,
    pub model_used: String,
    pub model_family: ModelKind,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn save_forecasts(path: &Path, forecasts: &[ForecastResult]) -> Result<()> {
    write_csv(path, forecasts)
}

pub fn load_forecasts(path: &Path) -> Result<Vec<ForecastResult>> {
    read_csv(path)
}

/// Artifact counts for a liveness check
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Health {
    pub status: String,
    pub rows: usize,
    pub airports: usize,
    pub forecasts: usize,
}

/// Read-only view over the latest pipeline artifacts
#[derive(Debug, Clone)]
pub struct ForecastService {
    figures_dir: PathBuf,
    dataset: CleanedDataset,
    forecasts: BTreeMap<(String, u32, ModelKind), ForecastResult>,
    best: BTreeMap<(String, u32), ModelKind>,
}

impl ForecastService {
    /// Load the filtered dataset, forecasts and (if present) best models
    pub fn open(paths: &PathsConfig) -> Result<Self> {
        let dataset = CleanedDataset::load(&paths.filtered_dataset())?;
        let forecasts = load_forecasts(&paths.forecasts())?
            .into_iter()
            .map(|f| ((f.airport.clone(), f.horizon, f.model), f))
            .collect();

        let best = match load_best_models(&paths.processed_dir) {
            Ok(rows) => rows
                .into_iter()
                .map(|b| ((b.airport, b.horizon), b.model))
                .collect(),
            Err(ForecastError::NotFound(path)) => {
                warn!(%path, "no backtest selection, using fallback model order");
                BTreeMap::new()
            }
            Err(e) => return Err(e),
        };

        Ok(Self {
            figures_dir: paths.figures_dir.clone(),
            dataset,
            forecasts,
            best,
        })
    }

    /// Eligible airports, sorted
    pub fn airports(&self) -> Vec<String> {
        self.dataset.airports()
    }

    /// Forecast from the airport's best backtested model; `horizon` is 1 to 3
    pub fn forecast(&self, airport: &str, horizon: u32) -> Result<ForecastResult> {
        if !(1..=MAX_HORIZON).contains(&horizon) {
            return Err(ForecastError::InvalidParameter(format!(
                "Horizon must be between 1 and {}, got {}",
                MAX_HORIZON, horizon
            )));
        }

        let key = airport.trim().to_uppercase();
        if self.dataset.series(&key).is_none() {
            return Err(ForecastError::NotFound(format!(
                "Airport {:?} is not in the eligible set",
                airport
            )));
        }

        let preferred = self.best.get(&(key.clone(), horizon)).copied();
        let chosen = preferred
            .into_iter()
            .chain(FALLBACK_ORDER)
            .find_map(|model| self.forecasts.get(&(key.clone(), horizon, model)))
            .ok_or_else(|| {
                ForecastError::NotFound(format!("No forecast for {} at horizon {}", key, horizon))
            })?;

        debug!(airport = %key, horizon, model = %chosen.model, "forecast served");
        Ok(chosen.clone())
    }

    /// PNG file names in the figures directory, sorted
    pub fn report_figures(&self) -> Result<Vec<String>> {
        list_figures(&self.figures_dir)
    }

    pub fn health(&self) -> Health {
        Health {
            status: "ok".to_string(),
            rows: self.dataset.len(),
            airports: self.dataset.airports().len(),
            forecasts: self.forecasts.len(),
        }
    }
}

/// Sorted `*.png` names of a directory; a missing directory has none
pub fn list_figures(dir: &Path) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut names: Vec<String> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.to_lowercase().ends_with(".png"))
        .collect();
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic_series;
    use crate::scores::{ScoreRecord, ScoreTable};
    use tempfile::tempdir;

    fn result(airport: &str, horizon: u32, model: ModelKind, value: f64) -> ForecastResult {
        let last = YearMonth::new(2025, 6).unwrap();
        ForecastResult {
            airport: airport.to_string(),
            last_observed: last,
            forecast_month: last.plus(horizon as i32),
            horizon,
            predicted_avg_delay: value,
            lower_95: None,
            upper_95: None,
            model,
            model_name: model.to_string(),
        }
    }

    fn service(dir: &Path, with_scores: bool) -> ForecastService {
        let paths = PathsConfig::under(dir);
        let series = synthetic_series("LUTON", YearMonth::new(2024, 7).unwrap(), &[10.0; 12]);
        CleanedDataset::new(series.records().to_vec())
            .save(&paths.filtered_dataset())
            .unwrap();

        let mut forecasts = Vec::new();
        for horizon in 1..=3 {
            forecasts.push(result("LUTON", horizon, ModelKind::Baseline, 10.0));
            forecasts.push(result("LUTON", horizon, ModelKind::Arima, 11.0));
        }
        save_forecasts(&paths.forecasts(), &forecasts).unwrap();

        if with_scores {
            ScoreTable::from_records(vec![
                ScoreRecord {
                    airport: "LUTON".to_string(),
                    model: ModelKind::Baseline,
                    horizon: 2,
                    mae: 1.0,
                    n_folds: 4,
                },
                ScoreRecord {
                    airport: "LUTON".to_string(),
                    model: ModelKind::Arima,
                    horizon: 2,
                    mae: 2.0,
                    n_folds: 4,
                },
            ])
            .save(&paths.processed_dir)
            .unwrap();
        }

        fs::create_dir_all(&paths.figures_dir).unwrap();
        fs::write(paths.figures_dir.join("b.png"), b"").unwrap();
        fs::write(paths.figures_dir.join("a.png"), b"").unwrap();
        fs::write(paths.figures_dir.join("notes.txt"), b"").unwrap();

        ForecastService::open(&paths).unwrap()
    }

    #[test]
    fn test_best_model_is_served() {
        let dir = tempdir().unwrap();
        let service = service(dir.path(), true);

        let h2 = service.forecast("luton", 2).unwrap();
        assert_eq!(h2.model, ModelKind::Baseline);
        assert_eq!(h2.horizon, 2);
        assert_eq!(h2.forecast_month, YearMonth::new(2025, 8).unwrap());
        assert_eq!(h2.forecast_date(), NaiveDate::from_ymd_opt(2025, 8, 1).unwrap());

        // no score at horizon 1: ARIMA is the fallback
        assert_eq!(service.forecast("LUTON", 1).unwrap().model, ModelKind::Arima);
    }

    #[test]
    fn test_response_shape() {
        let mut row = result("LUTON", 1, ModelKind::Arima, 12.3461);
        row.lower_95 = Some(9.8765);
        row.upper_95 = Some(14.8149);
        row.model_name = "ARIMA(1,1,1)".to_string();

        let json = serde_json::to_value(row.response()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "airport": "LUTON",
                "last_observed_month": "2025-06-01",
                "forecast_month": "2025-07-01",
                "horizon": 1,
                "predicted_avg_delay_minutes": 12.35,
                "lower_95": 9.88,
                "upper_95": 14.81,
                "model_used": "ARIMA(1,1,1)",
                "model_family": "arima",
            })
        );

        // bounds are omitted without an interval
        let json = serde_json::to_value(result("LUTON", 2, ModelKind::GradientBoosting, 10.0).response()).unwrap();
        assert!(json.get("lower_95").is_none());
        assert_eq!(json["forecast_month"], "2025-08-01");
    }

    #[test]
    fn test_fallback_without_scores() {
        let dir = tempdir().unwrap();
        let service = service(dir.path(), false);
        assert_eq!(service.forecast(" Luton ", 3).unwrap().model, ModelKind::Arima);
    }

    #[test]
    fn test_invalid_queries() {
        let dir = tempdir().unwrap();
        let service = service(dir.path(), false);

        assert!(matches!(
            service.forecast("LUTON", 4),
            Err(ForecastError::InvalidParameter(_))
        ));
        assert!(matches!(
            service.forecast("LUTON", 0),
            Err(ForecastError::InvalidParameter(_))
        ));
        assert!(matches!(
            service.forecast("ATLANTIS", 1),
            Err(ForecastError::NotFound(_))
        ));
    }

    #[test]
    fn test_airports_figures_and_health() {
        let dir = tempdir().unwrap();
        let service = service(dir.path(), false);

        assert_eq!(service.airports(), vec!["LUTON"]);
        assert_eq!(service.report_figures().unwrap(), vec!["a.png", "b.png"]);

        let health = service.health();
        assert_eq!(health.rows, 12);
        assert_eq!(health.airports, 1);
        assert_eq!(health.forecasts, 6);
    }

    #[test]
    fn test_open_without_artifacts_fails() {
        let dir = tempdir().unwrap();
        let result = ForecastService::open(&PathsConfig::under(dir.path()));
        assert!(matches!(result, Err(ForecastError::NotFound(_))));
    }
}
