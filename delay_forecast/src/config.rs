//! Pipeline configuration
//!
//! Every field has a default, so an empty configuration is valid. Values are
//! layered: optional TOML file, then `FLIGHT_DELAYS__SECTION__KEY`
//! environment variables, then whatever the caller overrides in code.

use crate::error::Result;
use crate::models::arima::{ArimaOrder, SelectionCriterion};
use delay_math::NelderMeadConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "FLIGHT_DELAYS";

/// Default configuration file name, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "flight_delays";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub paths: PathsConfig,
    pub features: FeatureConfig,
    pub filter: FilterConfig,
    pub arima: ArimaConfig,
    pub gradient_boosting: GradientBoostingConfig,
    pub backtest: BacktestConfig,
    pub visualization: VisualizationConfig,
}

impl PipelineConfig {
    /// Load from an explicit file (required) or the default file (optional),
    /// with environment overrides on top.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let builder = match file {
            Some(path) => config::Config::builder().add_source(config::File::from(path)),
            None => config::Config::builder()
                .add_source(config::File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding the raw monthly CSV reports
    pub raw_dir: PathBuf,
    /// Directory for datasets, forecasts, scores and model artifacts
    pub processed_dir: PathBuf,
    /// Directory for rendered PNG figures
    pub figures_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from("data/raw"),
            processed_dir: PathBuf::from("data/processed"),
            figures_dir: PathBuf::from("reports/figures"),
        }
    }
}

impl PathsConfig {
    /// Lay every directory out under one data root
    pub fn under(root: &Path) -> Self {
        Self {
            raw_dir: root.join("raw"),
            processed_dir: root.join("processed"),
            figures_dir: root.join("figures"),
        }
    }

    pub fn cleaned_dataset(&self) -> PathBuf {
        self.processed_dir.join("airport_month_features_clean.csv")
    }

    pub fn filtered_dataset(&self) -> PathBuf {
        self.processed_dir.join("airport_month_features_filtered.csv")
    }

    pub fn excluded_airports(&self) -> PathBuf {
        self.processed_dir.join("excluded_airports.csv")
    }

    pub fn forecasts(&self) -> PathBuf {
        self.processed_dir.join("forecasts.csv")
    }

    pub fn model_artifacts(&self) -> PathBuf {
        self.processed_dir.join("model_artifacts.json")
    }

    pub fn booster(&self) -> PathBuf {
        self.processed_dir.join("gbt_booster.json")
    }

    pub fn backtest_predictions(&self) -> PathBuf {
        self.processed_dir.join("backtest_predictions.csv")
    }

    pub fn backtest_exclusions(&self) -> PathBuf {
        self.processed_dir.join("backtest_exclusions.csv")
    }

    pub fn run_report(&self) -> PathBuf {
        self.processed_dir.join("run_report.json")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FeatureConfig {
    /// Rows above the header line in each raw file (report titles)
    pub header_row: usize,
    /// Longest run of missing months filled by linear interpolation
    pub max_interpolated_gap: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            header_row: 0,
            max_interpolated_gap: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FilterConfig {
    pub min_history_months: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_history_months: 12,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ArimaConfig {
    /// Candidate orders searched per airport
    pub candidates: Vec<ArimaOrder>,
    pub selection: SelectionCriterion,
    pub optimizer: NelderMeadConfig,
}

impl Default for ArimaConfig {
    fn default() -> Self {
        Self {
            candidates: vec![
                ArimaOrder::new(0, 1, 1),
                ArimaOrder::new(1, 1, 0),
                ArimaOrder::new(1, 1, 1),
                ArimaOrder::seasonal(1, 1, 0, 1, 0, 0, 12),
            ],
            selection: SelectionCriterion::Aic,
            optimizer: NelderMeadConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GradientBoostingConfig {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    /// Fraction of rows sampled per tree
    pub subsample: f64,
    /// Fraction of features sampled per tree
    pub colsample: f64,
    pub min_samples_leaf: usize,
    pub seed: u64,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 400,
            max_depth: 4,
            learning_rate: 0.05,
            subsample: 0.9,
            colsample: 0.9,
            min_samples_leaf: 2,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BacktestConfig {
    /// Months an airport needs before an origin to be evaluated there
    pub min_train_months: usize,
    /// Evaluate only the most recent origins; `None` uses every origin
    pub max_origins: Option<usize>,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            min_train_months: 9,
            max_origins: Some(12),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VisualizationConfig {
    /// Airports that get a forecast chart; `None` charts every eligible airport
    pub forecast_airports: Option<Vec<String>>,
    /// Horizon drawn on forecast charts
    pub forecast_horizon: u32,
    /// Observed months shown before the forecast
    pub history_months: usize,
    /// Airports drawn on the multi-airport trend chart and given a trend chart
    pub trend_airports: Vec<String>,
    pub top_n: usize,
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            forecast_airports: None,
            forecast_horizon: 3,
            history_months: 12,
            trend_airports: vec![
                "ABERDEEN".to_string(),
                "HEATHROW".to_string(),
                "GATWICK".to_string(),
                "MANCHESTER".to_string(),
                "EDINBURGH".to_string(),
            ],
            top_n: 15,
        }
    }
}
