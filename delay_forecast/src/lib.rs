//! # Delay Forecast
//!
//! Monthly average-delay forecasting for UK airports, built from the CAA
//! "On Time Performance" reports.
//!
//! ## Stages
//!
//! - Feature building: raw monthly CSV exports into one cleaned dataset with
//!   lag features and a global time index
//! - History filtering: airports with enough unbroken history
//! - Training: naive baseline, ARIMA/SARIMA and a pooled gradient-boosted
//!   tree ensemble, each forecasting 1 to 3 months ahead
//! - Backtesting: rolling-origin evaluation and per-airport MAE scores
//! - Figures: forecast and exploratory charts as PNG files
//! - Serving: forecast and airport queries answered from persisted artifacts
//!
//! ## Quick Start
//!
//! ```no_run
//! use delay_forecast::config::PipelineConfig;
//! use delay_forecast::pipeline::Pipeline;
//! use delay_forecast::serving::ForecastService;
//!
//! let config = PipelineConfig::load(None)?;
//! let report = Pipeline::new(config.clone()).run_all()?;
//! println!("{} skipped units", report.skipped.len());
//!
//! let service = ForecastService::open(&config.paths)?;
//! let forecast = service.forecast("heathrow", 2)?;
//! println!("{} -> {:.1} min", forecast.forecast_month, forecast.predicted_avg_delay);
//! # Ok::<(), delay_forecast::ForecastError>(())
//! ```

pub mod backtest;
pub mod config;
pub mod data;
pub mod error;
pub mod features;
pub mod filter;
pub mod models;
pub mod month;
pub mod pipeline;
pub mod report;
pub mod scores;
pub mod serving;
pub mod visualization;

// Re-export commonly used types
pub use crate::data::{AirportSeries, CleanedDataset, CleanedRecord, RawRecord};
pub use crate::error::{ForecastError, Result};
pub use crate::models::{ForecastModel, ModelForecast, ModelKind, TrainedForecastModel};
pub use crate::month::YearMonth;
pub use crate::report::{RunReport, SkipRecord, Stage};

/// Longest horizon any model is asked for
pub const MAX_HORIZON: u32 = 3;

/// Confidence level of every prediction interval
pub const INTERVAL_LEVEL: f64 = 0.95;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
